//! In-memory object store for tests and ephemeral runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::errors::{StoreError, StoreResult};
use super::object_store::{validate_key, ObjectInfo, ObjectStore, PresignedUrl, UrlIssuer};

#[derive(Debug)]
pub struct InMemoryObjectStore {
    blobs: RwLock<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    issuer: UrlIssuer,
}

impl InMemoryObjectStore {
    pub fn new(issuer: UrlIssuer) -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            issuer,
        }
    }

    /// Number of blobs held
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Internal("Lock poisoned".to_string())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        let mut blobs = self.blobs.write().map_err(|_| Self::poisoned())?;
        blobs.insert(key.to_string(), (data.to_vec(), Utc::now()));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let blobs = self.blobs.read().map_err(|_| Self::poisoned())?;
        blobs
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut blobs = self.blobs.write().map_err(|_| Self::poisoned())?;
        blobs.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let blobs = self.blobs.read().map_err(|_| Self::poisoned())?;
        Ok(blobs.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let blobs = self.blobs.read().map_err(|_| Self::poisoned())?;
        Ok(blobs
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (data, modified_at))| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
                modified_at: *modified_at,
            })
            .collect())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StoreResult<PresignedUrl> {
        if !self.exists(key).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(self.issuer.issue(key, ttl))
    }
}
