//! # File Upload Controller
//!
//! Two-step saga: blob write, then metadata insert. A failed insert is
//! compensated by deleting the blob; if that fails too, the orphan is
//! reported as a consistency warning.

use chrono::Utc;

use super::deadline::within;
use super::errors::{ConsistencyWarning, FileError, FileResult, StoreError};
use super::permissions::can_attach_project;
use super::policy::UploadPolicy;
use super::record::{generate_storage_key, FileRecord};
use super::service::FileStores;
use crate::auth::Identity;
use crate::observability::{log_warning, Event, Logger};

/// A payload to store
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub display_name: &'a str,
    pub mime_type: &'a str,
    pub data: &'a [u8],
    pub project_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadController {
    stores: FileStores,
    policy: UploadPolicy,
}

impl UploadController {
    pub fn new(stores: FileStores, policy: UploadPolicy) -> Self {
        Self { stores, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Store a payload and its metadata row
    pub async fn upload(
        &self,
        identity: &Identity,
        request: UploadRequest<'_>,
    ) -> FileResult<FileRecord> {
        self.validate(identity, &request)?;

        let now = Utc::now();
        let storage_key = generate_storage_key(request.display_name, now);
        let timeout = self.stores.call_timeout;

        // Step 1: blob
        if let Err(e) = within(timeout, self.stores.objects.put(&storage_key, request.data)).await
        {
            let reason = e.to_string();
            Logger::error(
                Event::UploadFailed,
                &[("storage_key", storage_key.as_str()), ("reason", reason.as_str())],
            );
            let warning = self.clear_failed_put(&storage_key, &reason).await;
            return Err(FileError::StorageWriteFailed { reason, warning });
        }

        // Step 2: metadata
        let record = FileRecord::new(
            storage_key.clone(),
            request.display_name,
            request.data,
            request.mime_type,
            &identity.id,
            request.project_id.clone(),
            now,
        );

        let insert_error = match within(timeout, self.stores.metadata.insert(&record)).await {
            Ok(saved) => {
                Logger::info(
                    Event::UploadComplete,
                    &[
                        ("record_id", saved.id.to_string().as_str()),
                        ("storage_key", saved.storage_key.as_str()),
                        ("size_bytes", saved.size_bytes.to_string().as_str()),
                        ("owner_id", saved.owner_id.as_str()),
                    ],
                );
                return Ok(saved);
            }
            Err(e) => e,
        };

        // A timed-out insert may have committed; if so the upload stands
        if matches!(insert_error, StoreError::Timeout(_)) {
            if let Ok(Ok(Some(saved))) = tokio::time::timeout(
                timeout,
                self.stores.metadata.get_by_storage_key(&storage_key),
            )
            .await
            {
                return Ok(saved);
            }
        }

        Err(self.compensate(&storage_key, insert_error).await)
    }

    fn validate(&self, identity: &Identity, request: &UploadRequest<'_>) -> FileResult<()> {
        if request.display_name.trim().is_empty() {
            return Err(FileError::InvalidInput("file name is required".to_string()));
        }

        self.policy
            .validate(request.data.len() as u64, request.mime_type)?;

        if let Some(project_id) = &request.project_id {
            if project_id.trim().is_empty() {
                return Err(FileError::InvalidInput("project id is empty".to_string()));
            }
            if !can_attach_project(identity, project_id) {
                return Err(FileError::AccessDenied);
            }
        }
        Ok(())
    }

    /// Remove whatever a failed or timed-out put may have written.
    ///
    /// Returns the orphan warning when the cleanup itself fails.
    async fn clear_failed_put(
        &self,
        storage_key: &str,
        reason: &str,
    ) -> Option<ConsistencyWarning> {
        let cleanup = self.stores.objects.delete(storage_key);
        let delete_error = match within(self.stores.call_timeout, cleanup).await {
            Ok(()) => return None,
            Err(e) => e,
        };

        let warning = ConsistencyWarning::OrphanBlob {
            storage_key: storage_key.to_string(),
            reason: format!(
                "blob write failed ({}); blob cleanup failed ({})",
                reason, delete_error
            ),
        };
        log_warning(&warning);
        Some(warning)
    }

    /// Undo the blob write after a failed metadata insert
    async fn compensate(&self, storage_key: &str, insert_error: StoreError) -> FileError {
        let reason = insert_error.to_string();

        match within(self.stores.call_timeout, self.stores.objects.delete(storage_key)).await {
            Ok(()) => {
                Logger::warn(
                    Event::UploadCompensated,
                    &[("storage_key", storage_key), ("reason", reason.as_str())],
                );
                FileError::MetadataWriteFailed {
                    reason,
                    warning: None,
                }
            }
            Err(delete_error) => {
                let warning = ConsistencyWarning::OrphanBlob {
                    storage_key: storage_key.to_string(),
                    reason: format!(
                        "metadata insert failed ({}); blob cleanup failed ({})",
                        reason, delete_error
                    ),
                };
                log_warning(&warning);
                FileError::MetadataWriteFailed {
                    reason,
                    warning: Some(warning),
                }
            }
        }
    }
}
