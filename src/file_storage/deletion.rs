//! # File Deletion Service
//!
//! Two-step saga: blob first, then the metadata row. A failed blob delete
//! aborts with the row untouched; a failed row delete leaves an orphan row
//! that is reported, not hidden.

use serde::Serialize;
use uuid::Uuid;

use super::deadline::within;
use super::errors::{ConsistencyWarning, FileError, FileResult};
use super::permissions::authorize;
use super::record::FileRecord;
use super::service::FileStores;
use crate::auth::Identity;
use crate::observability::{log_warning, Event, Logger};

/// What a delete call did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Blob removed; row removed unless `warning` says otherwise
    Deleted {
        record: FileRecord,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<ConsistencyWarning>,
    },
    /// No such record; nothing to do
    AlreadyAbsent,
}

impl DeleteOutcome {
    pub fn warning(&self) -> Option<&ConsistencyWarning> {
        match self {
            DeleteOutcome::Deleted { warning, .. } => warning.as_ref(),
            DeleteOutcome::AlreadyAbsent => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeletionService {
    stores: FileStores,
}

impl DeletionService {
    pub fn new(stores: FileStores) -> Self {
        Self { stores }
    }

    /// Delete a record and its blob. Deleting an absent id is a no-op.
    pub async fn delete(&self, identity: &Identity, id: &Uuid) -> FileResult<DeleteOutcome> {
        let timeout = self.stores.call_timeout;

        let record = match within(timeout, self.stores.metadata.get(id))
            .await
            .map_err(|e| FileError::QueryFailed(e.to_string()))?
        {
            Some(record) => record,
            None => return Ok(DeleteOutcome::AlreadyAbsent),
        };

        authorize(identity, &record)?;

        // Step 1: blob. An already-missing blob counts as deleted.
        if let Err(e) = within(timeout, self.stores.objects.delete(&record.storage_key)).await {
            Logger::error(
                Event::DeleteFailed,
                &[
                    ("record_id", record.id.to_string().as_str()),
                    ("storage_key", record.storage_key.as_str()),
                    ("reason", e.to_string().as_str()),
                ],
            );
            return Err(FileError::StorageDeleteFailed(e.to_string()));
        }

        // Step 2: metadata
        let warning = match within(timeout, self.stores.metadata.delete_by_id(&record.id)).await {
            Ok(_) => {
                Logger::info(
                    Event::DeleteComplete,
                    &[
                        ("record_id", record.id.to_string().as_str()),
                        ("storage_key", record.storage_key.as_str()),
                        ("identity", identity.id.as_str()),
                    ],
                );
                None
            }
            Err(e) => {
                let warning = ConsistencyWarning::OrphanMetadata {
                    record_id: record.id,
                    storage_key: record.storage_key.clone(),
                    reason: format!("blob deleted; metadata delete failed ({})", e),
                };
                log_warning(&warning);
                Some(warning)
            }
        };

        Ok(DeleteOutcome::Deleted { record, warning })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_storage::access::FileRef;
    use crate::file_storage::metadata::MetadataStore;
    use crate::file_storage::object_store::ObjectStore;
    use crate::file_storage::testing::{Faults, Harness};
    use crate::file_storage::upload::UploadRequest;

    async fn upload_as(h: &Harness, owner: &str) -> FileRecord {
        h.service
            .upload()
            .upload(
                &Identity::client(owner),
                UploadRequest {
                    display_name: "a.txt",
                    mime_type: "text/plain",
                    data: b"abc",
                    project_id: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_delete_removes_blob_and_row() {
        let h = Harness::new();
        let record = upload_as(&h, "u1").await;
        let owner = Identity::client("u1");

        let outcome = h.service.deletion().delete(&owner, &record.id).await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted { warning: None, .. }));

        assert!(!h.objects.exists(&record.storage_key).await.unwrap());
        assert!(h.metadata.get(&record.id).await.unwrap().is_none());
        assert!(matches!(
            h.service
                .access()
                .signed_download(&owner, FileRef::Id(record.id))
                .await,
            Err(FileError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_second_delete_is_noop() {
        let h = Harness::new();
        let record = upload_as(&h, "u1").await;
        let owner = Identity::client("u1");

        h.service.deletion().delete(&owner, &record.id).await.unwrap();
        let again = h.service.deletion().delete(&owner, &record.id).await.unwrap();
        assert!(matches!(again, DeleteOutcome::AlreadyAbsent));
    }

    #[tokio::test]
    async fn test_foreign_delete_denied() {
        let h = Harness::new();
        let record = upload_as(&h, "u1").await;

        let result = h
            .service
            .deletion()
            .delete(&Identity::client("u2"), &record.id)
            .await;
        assert!(matches!(result, Err(FileError::AccessDenied)));
        assert!(h.objects.exists(&record.storage_key).await.unwrap());

        let admin = h
            .service
            .deletion()
            .delete(&Identity::admin("root"), &record.id)
            .await
            .unwrap();
        assert!(matches!(admin, DeleteOutcome::Deleted { .. }));
    }

    #[tokio::test]
    async fn test_blob_failure_leaves_row() {
        let h = Harness::new();
        let record = upload_as(&h, "u1").await;
        Faults::set(&h.faults.fail_blob_delete);

        let result = h
            .service
            .deletion()
            .delete(&Identity::client("u1"), &record.id)
            .await;
        assert!(matches!(result, Err(FileError::StorageDeleteFailed(_))));
        assert!(h.metadata.get(&record.id).await.unwrap().is_some());
        assert!(h.objects.exists(&record.storage_key).await.unwrap());

        Faults::clear(&h.faults.fail_blob_delete);
        let retried = h
            .service
            .deletion()
            .delete(&Identity::client("u1"), &record.id)
            .await
            .unwrap();
        assert!(retried.warning().is_none());
    }

    #[tokio::test]
    async fn test_row_failure_reports_orphan_metadata() {
        let h = Harness::new();
        let record = upload_as(&h, "u1").await;
        Faults::set(&h.faults.fail_row_delete);

        let outcome = h
            .service
            .deletion()
            .delete(&Identity::client("u1"), &record.id)
            .await
            .unwrap();

        assert!(matches!(
            outcome.warning(),
            Some(ConsistencyWarning::OrphanMetadata { .. })
        ));
        assert!(!h.objects.exists(&record.storage_key).await.unwrap());

        // The row can still be cleared by a retry
        Faults::clear(&h.faults.fail_row_delete);
        let retried = h
            .service
            .deletion()
            .delete(&Identity::client("u1"), &record.id)
            .await
            .unwrap();
        assert!(retried.warning().is_none());
        assert!(h.metadata.get(&record.id).await.unwrap().is_none());
    }
}
