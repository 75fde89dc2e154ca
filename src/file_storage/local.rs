//! # Local Filesystem Object Store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::errors::{StoreError, StoreResult};
use super::object_store::{validate_key, ObjectInfo, ObjectStore, PresignedUrl, UrlIssuer};

/// Marker in the name of a blob that is still being written
const PARTIAL_MARKER: &str = ".partial-";

/// Object store rooted at a local directory
#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    issuer: UrlIssuer,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, issuer: UrlIssuer) -> Self {
        Self { root, issuer }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let full_path = self.full_path(key)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target, then rename, so readers never see half a blob
        let suffix: u32 = rand::thread_rng().gen();
        let mut partial = full_path.clone().into_os_string();
        partial.push(format!("{}{:08x}", PARTIAL_MARKER, suffix));
        let partial = PathBuf::from(partial);

        let written = async {
            let mut file = fs::File::create(&partial).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&partial, &full_path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&partial).await;
            return Err(StoreError::Io(e.to_string()));
        }

        tracing::debug!(key, bytes = data.len(), "blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let full_path = self.full_path(key)?;

        fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Io(e.to_string())
            }
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let full_path = self.full_path(key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let full_path = self.full_path(key)?;

        match fs::metadata(&full_path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let mut results = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e.to_string())),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;

                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(key) = self.relative_key(&path) else {
                    continue;
                };
                if key.contains(PARTIAL_MARKER) || !key.starts_with(prefix) {
                    continue;
                }

                let modified_at = meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                results.push(ObjectInfo {
                    key,
                    size: meta.len(),
                    modified_at,
                });
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StoreResult<PresignedUrl> {
        if !self.exists(key).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(self.issuer.issue(key, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (LocalObjectStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let issuer = UrlIssuer::ephemeral("http://localhost").unwrap();
        let store = LocalObjectStore::new(temp.path().to_path_buf(), issuer);
        (store, temp)
    }

    #[tokio::test]
    async fn test_write_read() {
        let (store, _temp) = create_store();

        store.put("files/2024/01/a.txt", b"hello").await.unwrap();
        let data = store.get("files/2024/01/a.txt").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp) = create_store();

        store.put("files/bye.txt", b"bye").await.unwrap();
        assert!(store.exists("files/bye.txt").await.unwrap());

        store.delete("files/bye.txt").await.unwrap();
        assert!(!store.exists("files/bye.txt").await.unwrap());
        store.delete("files/bye.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_not_found() {
        let (store, _temp) = create_store();

        let result = store.get("files/nonexistent.txt").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _temp) = create_store();

        let result = store.put("../escape.txt", b"x").await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let (store, _temp) = create_store();

        store.put("files/2024/01/a.txt", b"a").await.unwrap();
        store.put("files/2024/02/b.txt", b"bb").await.unwrap();
        store.put("other/c.txt", b"c").await.unwrap();

        let listed = store.list("files/").await.unwrap();
        let keys: Vec<_> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["files/2024/01/a.txt", "files/2024/02/b.txt"]);
        assert_eq!(listed[1].size, 2);
    }

    #[tokio::test]
    async fn test_signed_url_requires_blob() {
        let (store, _temp) = create_store();

        let missing = store.signed_url("files/x.txt", Duration::seconds(60)).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        store.put("files/x.txt", b"x").await.unwrap();
        let url = store
            .signed_url("files/x.txt", Duration::seconds(60))
            .await
            .unwrap();
        assert!(url.url.contains("files/x.txt"));
    }
}
