//! # Upload Policy
//!
//! Size and MIME limits applied before anything touches a store.

use serde::{Deserialize, Serialize};

use super::errors::{FileError, FileResult};

fn default_max_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Allowed MIME types (empty = all). `type/*` matches a whole family.
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,

    /// Maximum payload size in bytes
    #[serde(default = "default_max_size")]
    pub max_upload_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_mime_types: Vec::new(),
            max_upload_bytes: default_max_size(),
        }
    }
}

impl UploadPolicy {
    /// Check if MIME type is allowed
    pub fn is_mime_allowed(&self, mime: &str) -> bool {
        if self.allowed_mime_types.is_empty() {
            return true;
        }

        let mime = mime.trim().to_ascii_lowercase();
        // Parameters such as "; charset=utf-8" do not take part in the match
        let essence = mime.split(';').next().unwrap_or("").trim();

        self.allowed_mime_types.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            match allowed.strip_suffix("/*") {
                Some(family) => essence
                    .split_once('/')
                    .map(|(kind, _)| kind == family)
                    .unwrap_or(false),
                None => allowed == essence,
            }
        })
    }

    /// Check payload size limit
    pub fn check_size(&self, size: u64) -> FileResult<()> {
        if size > self.max_upload_bytes {
            Err(FileError::PayloadTooLarge(size, self.max_upload_bytes))
        } else {
            Ok(())
        }
    }

    /// Run every upload check
    pub fn validate(&self, size: u64, mime: &str) -> FileResult<()> {
        self.check_size(size)?;
        if mime.trim().is_empty() || !mime.contains('/') {
            return Err(FileError::InvalidInput(format!(
                "malformed MIME type '{}'",
                mime
            )));
        }
        if !self.is_mime_allowed(mime) {
            return Err(FileError::UnsupportedMimeType(mime.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_validation() {
        let policy = UploadPolicy {
            allowed_mime_types: vec!["image/*".to_string(), "application/pdf".to_string()],
            ..UploadPolicy::default()
        };

        assert!(policy.is_mime_allowed("image/png"));
        assert!(policy.is_mime_allowed("IMAGE/JPEG"));
        assert!(policy.is_mime_allowed("application/pdf"));
        assert!(!policy.is_mime_allowed("text/plain"));
        assert!(!policy.is_mime_allowed("imagex/png"));
    }

    #[test]
    fn test_mime_parameters_ignored() {
        let policy = UploadPolicy {
            allowed_mime_types: vec!["text/plain".to_string()],
            ..UploadPolicy::default()
        };
        assert!(policy.is_mime_allowed("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_empty_list_allows_all() {
        assert!(UploadPolicy::default().is_mime_allowed("application/zip"));
    }

    #[test]
    fn test_size_validation() {
        let policy = UploadPolicy {
            max_upload_bytes: 1024,
            ..UploadPolicy::default()
        };

        assert!(policy.check_size(1024).is_ok());
        assert!(matches!(
            policy.check_size(2048),
            Err(FileError::PayloadTooLarge(2048, 1024))
        ));
    }

    #[test]
    fn test_malformed_mime_rejected() {
        let policy = UploadPolicy::default();
        assert!(matches!(
            policy.validate(10, "plain"),
            Err(FileError::InvalidInput(_))
        ));
        assert!(policy.validate(10, "text/plain").is_ok());
    }
}
