//! # File Records

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix under which every uploaded blob lives
pub const KEY_PREFIX: &str = "files";

/// Longest file extension carried over into a storage key
const MAX_KEY_EXTENSION: usize = 8;

/// Longest display name kept on a record
const MAX_DISPLAY_NAME: usize = 255;

/// Metadata row describing one uploaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub storage_key: String,
    pub display_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Hex SHA-256 of the payload
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Build the record for a payload that has just been written under `storage_key`
    pub fn new(
        storage_key: String,
        display_name: &str,
        data: &[u8],
        mime_type: &str,
        owner_id: &str,
        project_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            storage_key,
            display_name: sanitize_display_name(display_name),
            size_bytes: data.len() as u64,
            mime_type: mime_type.to_string(),
            owner_id: owner_id.to_string(),
            project_id,
            checksum: calculate_checksum(data),
            created_at,
        }
    }
}

/// Calculate checksum for data
pub fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Generate a fresh storage key: time-based plus a random suffix.
///
/// Only a short alphanumeric extension of the display name reaches the key.
pub fn generate_storage_key(display_name: &str, now: DateTime<Utc>) -> String {
    let suffix: u64 = rand::thread_rng().gen();
    let mut key = format!(
        "{}/{:04}/{:02}/{}-{:016x}",
        KEY_PREFIX,
        now.year(),
        now.month(),
        now.timestamp_millis(),
        suffix
    );

    if let Some(ext) = key_extension(display_name) {
        key.push('.');
        key.push_str(&ext);
    }
    key
}

fn key_extension(display_name: &str) -> Option<String> {
    let base = display_name.rsplit(['/', '\\']).next()?;
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_KEY_EXTENSION
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Strip directory components and control characters from a client filename
pub fn sanitize_display_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DISPLAY_NAME)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}
