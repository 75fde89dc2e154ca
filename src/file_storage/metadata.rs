//! # Metadata Storage
//!
//! Persistence for [`FileRecord`] rows. Two implementations: an in-memory map
//! for tests and ephemeral runs, and a JSON document on local disk.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::record::FileRecord;

/// Default page size for queries
pub const DEFAULT_LIMIT: usize = 100;

/// Largest page a query may ask for
pub const MAX_LIMIT: usize = 1000;

/// Rows an identity may see: its own, plus any in its projects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityScope {
    pub owner_id: String,
    pub project_ids: Vec<String>,
}

impl VisibilityScope {
    pub fn admits(&self, record: &FileRecord) -> bool {
        record.owner_id == self.owner_id
            || record
                .project_id
                .as_ref()
                .map(|p| self.project_ids.contains(p))
                .unwrap_or(false)
    }
}

/// Filters for a metadata query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub owner_id: Option<String>,

    #[serde(default)]
    pub project_id: Option<String>,

    /// Inclusive lower bound on `created_at`
    #[serde(default)]
    pub created_from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `created_at`
    #[serde(default)]
    pub created_to: Option<DateTime<Utc>>,

    /// Case-insensitive substring of the display name
    #[serde(default)]
    pub name_contains: Option<String>,

    /// Return rows whose blob is missing too
    #[serde(default)]
    pub include_missing: bool,

    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub offset: usize,

    /// Set by the listing service, never by the caller
    #[serde(skip)]
    pub scope: Option<VisibilityScope>,
}

impl FileQuery {
    /// Check if a record passes every filter
    pub fn matches(&self, record: &FileRecord) -> bool {
        if let Some(scope) = &self.scope {
            if !scope.admits(record) {
                return false;
            }
        }
        if let Some(owner) = &self.owner_id {
            if &record.owner_id != owner {
                return false;
            }
        }
        if let Some(project) = &self.project_id {
            if record.project_id.as_ref() != Some(project) {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if record.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if record.created_at > to {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            let needle = needle.to_lowercase();
            if !record.display_name.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Filter, order newest first, then page
    pub fn apply<'a, I>(&self, records: I) -> Vec<FileRecord>
    where
        I: IntoIterator<Item = &'a FileRecord>,
    {
        let mut matched: Vec<FileRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        sort_newest_first(&mut matched);

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.effective_limit())
            .collect()
    }
}

/// Newest first; ties broken by storage key, which embeds the upload millisecond
pub fn sort_newest_first(records: &mut [FileRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.storage_key.cmp(&a.storage_key))
    });
}

/// Trait for metadata storage operations
#[async_trait]
pub trait MetadataStore: Send + Sync + std::fmt::Debug {
    /// Insert a new record. Fails with `Duplicate` if the id or key is taken.
    async fn insert(&self, record: &FileRecord) -> StoreResult<FileRecord>;

    /// Get a record by id
    async fn get(&self, id: &Uuid) -> StoreResult<Option<FileRecord>>;

    /// Get a record by storage key
    async fn get_by_storage_key(&self, key: &str) -> StoreResult<Option<FileRecord>>;

    /// Query records, newest first
    async fn query(&self, query: &FileQuery) -> StoreResult<Vec<FileRecord>>;

    /// Delete a record. Returns whether a row was removed; a missing row is not an error.
    async fn delete_by_id(&self, id: &Uuid) -> StoreResult<bool>;

    /// Every record, for reconciliation
    async fn all(&self) -> StoreResult<Vec<FileRecord>>;
}

fn check_unique(rows: &BTreeMap<Uuid, FileRecord>, record: &FileRecord) -> StoreResult<()> {
    if rows.contains_key(&record.id) {
        return Err(StoreError::Duplicate(record.id.to_string()));
    }
    if rows.values().any(|r| r.storage_key == record.storage_key) {
        return Err(StoreError::Duplicate(record.storage_key.clone()));
    }
    Ok(())
}

/// In-memory metadata store for testing
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    rows: RwLock<BTreeMap<Uuid, FileRecord>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Internal("Lock poisoned".to_string())
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, record: &FileRecord) -> StoreResult<FileRecord> {
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        check_unique(&rows, record)?;
        rows.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<FileRecord>> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.get(id).cloned())
    }

    async fn get_by_storage_key(&self, key: &str) -> StoreResult<Option<FileRecord>> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.values().find(|r| r.storage_key == key).cloned())
    }

    async fn query(&self, query: &FileQuery) -> StoreResult<Vec<FileRecord>> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(query.apply(rows.values()))
    }

    async fn delete_by_id(&self, id: &Uuid) -> StoreResult<bool> {
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        Ok(rows.remove(id).is_some())
    }

    async fn all(&self) -> StoreResult<Vec<FileRecord>> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.values().cloned().collect())
    }
}

/// On-disk layout of the JSON metadata document
#[derive(Debug, Serialize, Deserialize)]
struct MetadataDocument {
    version: u32,
    files: Vec<FileRecord>,
}

const DOCUMENT_VERSION: u32 = 1;

type Rows = BTreeMap<Uuid, FileRecord>;

/// Metadata store persisted as one JSON document.
///
/// The document on disk is the only copy: reads re-load it under a shared
/// lock, and every mutation is a read-modify-write under an exclusive lock on
/// a sidecar `.lock` file. A running server and a `reconcile` run can hold
/// handles on the same document without losing each other's writes.
#[derive(Debug)]
pub struct JsonFileMetadataStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileMetadataStore {
    /// Open the document at `path`; a missing document reads as empty
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");

        let store = Self {
            path,
            lock_path: PathBuf::from(lock_path),
        };
        store.snapshot().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current rows, read under a shared lock
    async fn snapshot(&self) -> StoreResult<Rows> {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        run_blocking(move || {
            let lock = open_lock_file(&lock_path)?;
            FileExt::lock_shared(&lock)?;
            read_document(&path)
        })
        .await
    }

    /// Apply `change` to the rows currently on disk and write them back.
    ///
    /// `change` returns its result and whether it modified the rows; the
    /// document is only rewritten when it did.
    async fn update<T, F>(&self, change: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Rows) -> StoreResult<(T, bool)> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        run_blocking(move || {
            let lock = open_lock_file(&lock_path)?;
            FileExt::lock_exclusive(&lock)?;

            let mut rows = read_document(&path)?;
            let (result, changed) = change(&mut rows)?;
            if changed {
                write_document(&path, &rows)?;
            }
            Ok(result)
        })
        .await
    }
}

async fn run_blocking<T, F>(work: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Internal(format!("metadata task failed: {}", e)))?
}

/// The lock is released when the returned handle is dropped
fn open_lock_file(lock_path: &Path) -> StoreResult<File> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)?;
    Ok(file)
}

fn read_document(path: &Path) -> StoreResult<Rows> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Rows::new()),
        Err(e) => return Err(StoreError::Io(e.to_string())),
    };

    let document: MetadataDocument = serde_json::from_slice(&bytes)?;
    if document.version != DOCUMENT_VERSION {
        return Err(StoreError::Serialization(format!(
            "unsupported metadata document version {}",
            document.version
        )));
    }
    Ok(document.files.into_iter().map(|r| (r.id, r)).collect())
}

/// Write through a temp file and a rename so readers never see a torn document
fn write_document(path: &Path, rows: &Rows) -> StoreResult<()> {
    let document = MetadataDocument {
        version: DOCUMENT_VERSION,
        files: rows.values().cloned().collect(),
    };
    let bytes = serde_json::to_vec_pretty(&document)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp = path.to_path_buf().into_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, &bytes)?;
    fs::rename(&temp, path)?;
    Ok(())
}

#[async_trait]
impl MetadataStore for JsonFileMetadataStore {
    async fn insert(&self, record: &FileRecord) -> StoreResult<FileRecord> {
        let record = record.clone();
        self.update(move |rows| {
            check_unique(rows, &record)?;
            rows.insert(record.id, record.clone());
            Ok((record, true))
        })
        .await
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<FileRecord>> {
        Ok(self.snapshot().await?.remove(id))
    }

    async fn get_by_storage_key(&self, key: &str) -> StoreResult<Option<FileRecord>> {
        let rows = self.snapshot().await?;
        Ok(rows.into_values().find(|r| r.storage_key == key))
    }

    async fn query(&self, query: &FileQuery) -> StoreResult<Vec<FileRecord>> {
        let rows = self.snapshot().await?;
        Ok(query.apply(rows.values()))
    }

    async fn delete_by_id(&self, id: &Uuid) -> StoreResult<bool> {
        let id = *id;
        self.update(move |rows| {
            let removed = rows.remove(&id).is_some();
            Ok((removed, removed))
        })
        .await
    }

    async fn all(&self) -> StoreResult<Vec<FileRecord>> {
        Ok(self.snapshot().await?.into_values().collect())
    }
}
