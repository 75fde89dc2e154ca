//! # File Access Service
//!
//! Resolves a record, applies the capability check and issues a signed URL.
//! Nothing is persisted; the Object Store enforces expiry.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::deadline::within;
use super::errors::{ConsistencyWarning, FileError, FileResult, StoreError};
use super::permissions::authorize;
use super::record::FileRecord;
use super::service::FileStores;
use crate::auth::Identity;
use crate::observability::{log_warning, Event, Logger};

/// How the caller names a file
#[derive(Debug, Clone, Copy)]
pub enum FileRef<'a> {
    Id(Uuid),
    StorageKey(&'a str),
}

impl std::fmt::Display for FileRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRef::Id(id) => write!(f, "{}", id),
            FileRef::StorageKey(key) => f.write_str(key),
        }
    }
}

/// A time-limited download link
#[derive(Debug, Clone, Serialize)]
pub struct SignedDownload {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub record: FileRecord,
}

#[derive(Debug, Clone)]
pub struct AccessService {
    stores: FileStores,
    ttl: Duration,
}

impl AccessService {
    pub fn new(stores: FileStores, ttl: Duration) -> Self {
        Self { stores, ttl }
    }

    /// Lifetime applied to every signed URL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a record the identity may see
    pub async fn resolve(&self, identity: &Identity, file: FileRef<'_>) -> FileResult<FileRecord> {
        let lookup = match file {
            FileRef::Id(id) => {
                within(self.stores.call_timeout, self.stores.metadata.get(&id)).await
            }
            FileRef::StorageKey(key) => {
                within(
                    self.stores.call_timeout,
                    self.stores.metadata.get_by_storage_key(key),
                )
                .await
            }
        };

        let record = lookup
            .map_err(|e| FileError::QueryFailed(e.to_string()))?
            .ok_or_else(|| FileError::RecordNotFound(file.to_string()))?;

        authorize(identity, &record)?;
        Ok(record)
    }

    /// Issue a signed download URL for a record the identity may see
    pub async fn signed_download(
        &self,
        identity: &Identity,
        file: FileRef<'_>,
    ) -> FileResult<SignedDownload> {
        let record = self.resolve(identity, file).await?;

        let issued = within(
            self.stores.call_timeout,
            self.stores.objects.signed_url(&record.storage_key, self.ttl),
        )
        .await
        .map_err(|e| {
            if let StoreError::NotFound(_) = e {
                log_warning(&ConsistencyWarning::OrphanMetadata {
                    record_id: record.id,
                    storage_key: record.storage_key.clone(),
                    reason: "blob missing at signing time".to_string(),
                });
            }
            FileError::SignedUrlGenerationFailed(e.to_string())
        })?;

        Logger::info(
            Event::SignedUrlIssued,
            &[
                ("record_id", record.id.to_string().as_str()),
                ("identity", identity.id.as_str()),
                ("expires_at", issued.expires_at.to_rfc3339().as_str()),
            ],
        );

        Ok(SignedDownload {
            url: issued.url,
            expires_at: issued.expires_at,
            record,
        })
    }
}
