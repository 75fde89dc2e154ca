//! # Reconciliation Sweep
//!
//! Finds blobs with no metadata row and rows with no blob. Anything newer
//! than the grace period is left alone since an upload or delete may still
//! be between its two steps.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use serde::Serialize;

use super::deadline::within;
use super::errors::{FileError, FileResult};
use super::object_store::ObjectInfo;
use super::record::{FileRecord, KEY_PREFIX};
use super::service::FileStores;
use crate::observability::{Event, Logger};

/// Default age a blob or row must reach before it can be called an orphan
pub const DEFAULT_GRACE_SECS: i64 = 600;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub orphan_blobs: Vec<ObjectInfo>,
    pub orphan_records: Vec<FileRecord>,
    pub skipped_recent: usize,
    pub repaired_blobs: usize,
    pub repaired_records: usize,
    pub failures: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_blobs.is_empty() && self.orphan_records.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    stores: FileStores,
    grace: Duration,
}

impl Reconciler {
    pub fn new(stores: FileStores, grace: Duration) -> Self {
        Self { stores, grace }
    }

    /// Scan both stores. With `apply`, delete orphan blobs and orphan rows.
    pub async fn run(&self, apply: bool) -> FileResult<ReconcileReport> {
        let timeout = self.stores.call_timeout;
        let cutoff = Utc::now() - self.grace;
        Logger::info(
            Event::ReconcileStart,
            &[("apply", if apply { "true" } else { "false" })],
        );

        // Blobs before rows: an upload finishing mid-sweep shows up as a row
        let blobs = within(timeout, self.stores.objects.list(&format!("{}/", KEY_PREFIX)))
            .await
            .map_err(|e| FileError::QueryFailed(e.to_string()))?;
        let rows = within(timeout, self.stores.metadata.all())
            .await
            .map_err(|e| FileError::QueryFailed(e.to_string()))?;

        let row_keys: HashSet<&str> = rows.iter().map(|r| r.storage_key.as_str()).collect();
        let blob_keys: HashSet<&str> = blobs.iter().map(|b| b.key.as_str()).collect();

        let mut report = ReconcileReport::default();

        for blob in &blobs {
            if row_keys.contains(blob.key.as_str()) {
                continue;
            }
            if blob.modified_at > cutoff {
                report.skipped_recent += 1;
            } else {
                report.orphan_blobs.push(blob.clone());
            }
        }

        for row in &rows {
            if blob_keys.contains(row.storage_key.as_str()) {
                continue;
            }
            if row.created_at > cutoff {
                report.skipped_recent += 1;
            } else {
                report.orphan_records.push(row.clone());
            }
        }

        if apply {
            self.repair(&mut report).await;
        }

        Logger::info(
            Event::ReconcileComplete,
            &[
                ("orphan_blobs", report.orphan_blobs.len().to_string().as_str()),
                ("orphan_records", report.orphan_records.len().to_string().as_str()),
                ("skipped_recent", report.skipped_recent.to_string().as_str()),
                ("repaired_blobs", report.repaired_blobs.to_string().as_str()),
                ("repaired_records", report.repaired_records.to_string().as_str()),
                ("failures", report.failures.len().to_string().as_str()),
            ],
        );

        Ok(report)
    }

    async fn repair(&self, report: &mut ReconcileReport) {
        let timeout = self.stores.call_timeout;

        for blob in &report.orphan_blobs {
            match within(timeout, self.stores.objects.delete(&blob.key)).await {
                Ok(()) => report.repaired_blobs += 1,
                Err(e) => report.failures.push(format!("blob '{}': {}", blob.key, e)),
            }
        }

        for row in &report.orphan_records {
            // The blob may have been rewritten since the scan
            match within(timeout, self.stores.objects.exists(&row.storage_key)).await {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    report.failures.push(format!("row {}: {}", row.id, e));
                    continue;
                }
            }
            match within(timeout, self.stores.metadata.delete_by_id(&row.id)).await {
                Ok(_) => report.repaired_records += 1,
                Err(e) => report.failures.push(format!("row {}: {}", row.id, e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::file_storage::metadata::MetadataStore;
    use crate::file_storage::object_store::ObjectStore;
    use crate::file_storage::testing::{Faults, Harness};
    use crate::file_storage::upload::UploadRequest;

    async fn upload(h: &Harness) -> FileRecord {
        h.service
            .upload()
            .upload(
                &Identity::client("u1"),
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
    async fn test_consistent_stores_are_clean() {
        let h = Harness::new();
        upload(&h).await;
        upload(&h).await;

        let report = h.service.reconciler(Duration::zero()).run(false).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.skipped_recent, 0);
    }

    #[tokio::test]
    async fn test_finds_and_repairs_orphans() {
        let h = Harness::new();

        // Orphan blob from a failed compensation
        Faults::set(&h.faults.fail_insert);
        Faults::set(&h.faults.fail_blob_delete);
        let _ = h
            .service
            .upload()
            .upload(
                &Identity::client("u1"),
                UploadRequest {
                    display_name: "b.txt",
                    mime_type: "text/plain",
                    data: b"b",
                    project_id: None,
                },
            )
            .await;
        Faults::clear(&h.faults.fail_insert);
        Faults::clear(&h.faults.fail_blob_delete);

        // Orphan row from a blob removed out of band
        let record = upload(&h).await;
        h.objects.delete(&record.storage_key).await.unwrap();

        let reconciler = h.service.reconciler(Duration::zero());
        let report = reconciler.run(false).await.unwrap();
        assert_eq!(report.orphan_blobs.len(), 1);
        assert_eq!(report.orphan_records.len(), 1);
        assert_eq!(report.orphan_records[0].id, record.id);
        assert_eq!(report.repaired_blobs, 0);

        let report = reconciler.run(true).await.unwrap();
        assert_eq!(report.repaired_blobs, 1);
        assert_eq!(report.repaired_records, 1);
        assert!(report.failures.is_empty());

        assert_eq!(h.blob_count(), 0);
        assert!(h.metadata.get(&record.id).await.unwrap().is_none());
        assert!(reconciler.run(false).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_recent_orphans_skipped() {
        let h = Harness::new();
        h.objects.put("files/2026/01/1-abc", b"x").await.unwrap();

        let report = h
            .service
            .reconciler(Duration::seconds(DEFAULT_GRACE_SECS))
            .run(true)
            .await
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.skipped_recent, 1);
        assert_eq!(h.blob_count(), 1);
    }

    #[tokio::test]
    async fn test_blobs_outside_prefix_ignored() {
        let h = Harness::new();
        h.objects.put("other/thing", b"x").await.unwrap();

        let report = h.service.reconciler(Duration::zero()).run(true).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(h.blob_count(), 1);
    }
}
