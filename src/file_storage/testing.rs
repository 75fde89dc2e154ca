//! Fault-injecting store wrappers for saga tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::memory::InMemoryObjectStore;
use super::metadata::{FileQuery, InMemoryMetadataStore, MetadataStore};
use super::object_store::{ObjectInfo, ObjectStore, PresignedUrl, UrlIssuer};
use super::record::FileRecord;
use super::service::{FileService, FileStores};

#[derive(Debug, Default)]
pub struct Faults {
    pub fail_put: AtomicBool,
    pub hang_put: AtomicBool,
    /// The blob is written but the put still reports failure
    pub lose_put_ack: AtomicBool,
    pub fail_blob_delete: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_query: AtomicBool,
    pub fail_row_delete: AtomicBool,
}

impl Faults {
    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(flag: &AtomicBool) {
        flag.store(false, Ordering::SeqCst);
    }

    fn on(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

fn injected() -> StoreError {
    StoreError::Unavailable("injected fault".to_string())
}

#[derive(Debug)]
pub struct FlakyObjectStore {
    pub inner: InMemoryObjectStore,
    pub faults: Arc<Faults>,
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        if Faults::on(&self.faults.hang_put) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if Faults::on(&self.faults.fail_put) {
            return Err(injected());
        }
        self.inner.put(key, data).await?;
        if Faults::on(&self.faults.lose_put_ack) {
            return Err(injected());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if Faults::on(&self.faults.fail_blob_delete) {
            return Err(injected());
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        self.inner.list(prefix).await
    }

    async fn signed_url(&self, key: &str, ttl: chrono::Duration) -> StoreResult<PresignedUrl> {
        self.inner.signed_url(key, ttl).await
    }
}

#[derive(Debug)]
pub struct FlakyMetadataStore {
    pub inner: InMemoryMetadataStore,
    pub faults: Arc<Faults>,
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn insert(&self, record: &FileRecord) -> StoreResult<FileRecord> {
        if Faults::on(&self.faults.fail_insert) {
            return Err(injected());
        }
        self.inner.insert(record).await
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<FileRecord>> {
        self.inner.get(id).await
    }

    async fn get_by_storage_key(&self, key: &str) -> StoreResult<Option<FileRecord>> {
        self.inner.get_by_storage_key(key).await
    }

    async fn query(&self, query: &FileQuery) -> StoreResult<Vec<FileRecord>> {
        if Faults::on(&self.faults.fail_query) {
            return Err(injected());
        }
        self.inner.query(query).await
    }

    async fn delete_by_id(&self, id: &Uuid) -> StoreResult<bool> {
        if Faults::on(&self.faults.fail_row_delete) {
            return Err(injected());
        }
        self.inner.delete_by_id(id).await
    }

    async fn all(&self) -> StoreResult<Vec<FileRecord>> {
        self.inner.all().await
    }
}

/// A service over fault-injecting in-memory stores
pub struct Harness {
    pub service: FileService,
    pub objects: Arc<FlakyObjectStore>,
    pub metadata: Arc<FlakyMetadataStore>,
    pub faults: Arc<Faults>,
}

impl Harness {
    pub fn new() -> Self {
        let faults = Arc::new(Faults::default());
        let objects = Arc::new(FlakyObjectStore {
            inner: InMemoryObjectStore::new(UrlIssuer::ephemeral("http://localhost").unwrap()),
            faults: faults.clone(),
        });
        let metadata = Arc::new(FlakyMetadataStore {
            inner: InMemoryMetadataStore::new(),
            faults: faults.clone(),
        });

        let stores = FileStores::new(objects.clone(), metadata.clone())
            .with_call_timeout(Duration::from_millis(200));

        Self {
            service: FileService::with_defaults(stores),
            objects,
            metadata,
            faults,
        }
    }

    pub fn blob_count(&self) -> usize {
        self.objects.inner.len()
    }
}
