//! # Object Store
//!
//! Durable key-addressed blob storage with time-limited signed URLs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;

use super::errors::{StoreError, StoreResult};
use super::signed_url::SignedUrlSigner;

/// A blob as seen by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// A URL granting temporary read access to one blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Backend trait for blob storage
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Write data under key, replacing anything already there
    async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Read data at key
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Delete blob at key. A missing blob counts as deleted.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// List blobs whose key starts with prefix
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>>;

    /// Issue a signed URL for an existing blob
    async fn signed_url(&self, key: &str, ttl: Duration) -> StoreResult<PresignedUrl>;
}

/// Reject keys that could escape the store root or alias another key
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > 1024 {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.starts_with('/') || key.contains('\\') || key.contains('\0') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Signs URLs on behalf of a store that has no signing service of its own
#[derive(Debug, Clone)]
pub struct UrlIssuer {
    signer: SignedUrlSigner,
    base_url: String,
}

impl UrlIssuer {
    pub fn new(signer: SignedUrlSigner, base_url: impl Into<String>) -> Self {
        Self {
            signer,
            base_url: base_url.into(),
        }
    }

    /// Issuer with a throwaway random secret
    pub fn ephemeral(base_url: impl Into<String>) -> StoreResult<Self> {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        let signer =
            SignedUrlSigner::new(&secret).map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(Self::new(signer, base_url))
    }

    pub fn signer(&self) -> &SignedUrlSigner {
        &self.signer
    }

    pub fn issue(&self, key: &str, ttl: Duration) -> PresignedUrl {
        let signed = self.signer.sign(key, ttl);
        PresignedUrl {
            url: signed.to_url(&self.base_url),
            expires_at: signed.expires_at,
        }
    }
}
