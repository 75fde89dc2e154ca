//! # File Storage Errors

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Result type for file flow operations
pub type FileResult<T> = Result<T, FileError>;

/// Result type for raw store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by an Object Store or Metadata Store implementation.
///
/// The services translate these into the step-specific [`FileError`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(err.to_string())
        } else {
            StoreError::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// A blob or metadata row left without its counterpart.
///
/// Never fatal. Always logged and handed back to the caller so that the
/// reconciliation sweep can pick it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyWarning {
    /// Blob exists but no metadata row points at it
    OrphanBlob { storage_key: String, reason: String },

    /// Metadata row exists but its blob is gone
    OrphanMetadata {
        record_id: Uuid,
        storage_key: String,
        reason: String,
    },
}

impl ConsistencyWarning {
    pub fn storage_key(&self) -> &str {
        match self {
            ConsistencyWarning::OrphanBlob { storage_key, .. } => storage_key,
            ConsistencyWarning::OrphanMetadata { storage_key, .. } => storage_key,
        }
    }
}

impl std::fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyWarning::OrphanBlob { storage_key, reason } => {
                write!(f, "orphan blob at '{}': {}", storage_key, reason)
            }
            ConsistencyWarning::OrphanMetadata {
                record_id,
                storage_key,
                reason,
            } => write!(
                f,
                "orphan metadata row {} (blob '{}'): {}",
                record_id, storage_key, reason
            ),
        }
    }
}

/// File flow errors
#[derive(Debug, Clone, Error)]
pub enum FileError {
    // Validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Payload too large: {0} bytes (max: {1})")]
    PayloadTooLarge(u64, u64),

    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    // Authorization errors
    #[error("Authentication required")]
    Unauthenticated,

    /// Deliberately carries no detail about the record
    #[error("Access denied")]
    AccessDenied,

    // Not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    // Infrastructure errors
    #[error("Storage write failed: {reason}")]
    StorageWriteFailed {
        reason: String,
        warning: Option<ConsistencyWarning>,
    },

    #[error("Storage delete failed: {0}")]
    StorageDeleteFailed(String),

    #[error("Metadata write failed: {reason}")]
    MetadataWriteFailed {
        reason: String,
        warning: Option<ConsistencyWarning>,
    },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Signed URL generation failed: {0}")]
    SignedUrlGenerationFailed(String),

    // Signed URL verification
    #[error("URL expired")]
    UrlExpired,

    #[error("Invalid signature")]
    InvalidSignature,
}

impl FileError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            FileError::InvalidInput(_) => 400,
            FileError::PayloadTooLarge(_, _) => 413,
            FileError::UnsupportedMimeType(_) => 415,
            FileError::Unauthenticated => 401,
            FileError::AccessDenied => 403,
            FileError::RecordNotFound(_) => 404,
            FileError::StorageWriteFailed { .. } => 502,
            FileError::StorageDeleteFailed(_) => 502,
            FileError::MetadataWriteFailed { .. } => 500,
            FileError::QueryFailed(_) => 500,
            FileError::SignedUrlGenerationFailed(_) => 502,
            FileError::UrlExpired => 403,
            FileError::InvalidSignature => 403,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FileError::StorageWriteFailed { .. }
                | FileError::StorageDeleteFailed(_)
                | FileError::MetadataWriteFailed { .. }
                | FileError::QueryFailed(_)
                | FileError::SignedUrlGenerationFailed(_)
        )
    }

    /// Reconciliation debt carried by this error, if any
    pub fn warning(&self) -> Option<&ConsistencyWarning> {
        match self {
            FileError::StorageWriteFailed { warning, .. }
            | FileError::MetadataWriteFailed { warning, .. } => warning.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FileError::PayloadTooLarge(100, 50).status_code(), 413);
        assert_eq!(FileError::UnsupportedMimeType("x/y".into()).status_code(), 415);
        assert_eq!(FileError::AccessDenied.status_code(), 403);
        assert_eq!(FileError::RecordNotFound("id".into()).status_code(), 404);
        assert_eq!(FileError::Unauthenticated.status_code(), 401);
    }

    #[test]
    fn test_access_denied_is_generic() {
        assert_eq!(FileError::AccessDenied.to_string(), "Access denied");
    }

    #[test]
    fn test_transient_classification() {
        assert!(FileError::StorageWriteFailed {
            reason: "io".into(),
            warning: None,
        }
        .is_transient());
        assert!(!FileError::AccessDenied.is_transient());
        assert!(!FileError::InvalidInput("name".into()).is_transient());
    }

    #[test]
    fn test_warning_serializes_with_kind() {
        let warning = ConsistencyWarning::OrphanBlob {
            storage_key: "files/2024/01/1-ab".into(),
            reason: "disk full".into(),
        };
        let value = serde_json::to_value(&warning).unwrap();
        assert_eq!(value["kind"], "orphan_blob");
        assert_eq!(value["storage_key"], "files/2024/01/1-ab");
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
