//! # File Listing Service

use serde::Serialize;

use super::deadline::within;
use super::errors::{ConsistencyWarning, FileError, FileResult};
use super::metadata::FileQuery;
use super::permissions::visibility_scope;
use super::record::FileRecord;
use super::service::FileStores;
use crate::auth::Identity;
use crate::observability::log_warning;

/// Records visible to the caller, newest first
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileListing {
    pub files: Vec<FileRecord>,
    /// Rows dropped because their blob is missing
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConsistencyWarning>,
}

#[derive(Debug, Clone)]
pub struct ListingService {
    stores: FileStores,
}

impl ListingService {
    pub fn new(stores: FileStores) -> Self {
        Self { stores }
    }

    /// List records matching `query` that `identity` is allowed to see.
    ///
    /// Rows whose blob is gone are dropped unless `query.include_missing` is set.
    pub async fn list(&self, identity: &Identity, mut query: FileQuery) -> FileResult<FileListing> {
        query.scope = visibility_scope(identity);
        let timeout = self.stores.call_timeout;

        let rows = within(timeout, self.stores.metadata.query(&query))
            .await
            .map_err(|e| FileError::QueryFailed(e.to_string()))?;

        if query.include_missing {
            return Ok(FileListing {
                files: rows,
                warnings: Vec::new(),
            });
        }

        let mut listing = FileListing::default();
        for record in rows {
            let present = within(timeout, self.stores.objects.exists(&record.storage_key))
                .await
                .map_err(|e| FileError::QueryFailed(e.to_string()))?;

            if present {
                listing.files.push(record);
            } else {
                let warning = ConsistencyWarning::OrphanMetadata {
                    record_id: record.id,
                    storage_key: record.storage_key.clone(),
                    reason: "blob missing at listing time".to_string(),
                };
                log_warning(&warning);
                listing.warnings.push(warning);
            }
        }

        Ok(listing)
    }
}
