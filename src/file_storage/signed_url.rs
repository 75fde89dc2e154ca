//! # Signed URL Generation
//!
//! HMAC-SHA256 tokens binding a storage key to an expiry timestamp. The
//! holder of a valid URL may read the blob until it expires; no other check
//! applies.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::errors::{FileError, FileResult};

type HmacSha256 = Hmac<Sha256>;

/// Path under which signed objects are served
pub const SIGNED_OBJECT_PATH: &str = "/storage/v1/object/sign";

/// Signs and verifies object URLs
#[derive(Clone)]
pub struct SignedUrlSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for SignedUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrlSigner").finish_non_exhaustive()
    }
}

impl SignedUrlSigner {
    pub fn new(secret: &[u8]) -> FileResult<Self> {
        if secret.is_empty() {
            return Err(FileError::SignedUrlGenerationFailed(
                "signing secret is empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| FileError::SignedUrlGenerationFailed(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Sign `storage_key` for `ttl` from now
    pub fn sign(&self, storage_key: &str, ttl: Duration) -> SignedUrl {
        let expires_at = truncate_to_second(Utc::now() + ttl);
        let token = self.token(storage_key, expires_at.timestamp());

        SignedUrl {
            storage_key: storage_key.to_string(),
            expires_at,
            token,
        }
    }

    /// Verify a token presented for `storage_key`
    pub fn verify(&self, storage_key: &str, expires: i64, token: &str) -> FileResult<()> {
        if Utc::now().timestamp() > expires {
            return Err(FileError::UrlExpired);
        }

        let presented = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| FileError::InvalidSignature)?;

        let mut mac = self.mac.clone();
        mac.update(Self::message(storage_key, expires).as_bytes());
        mac.verify_slice(&presented)
            .map_err(|_| FileError::InvalidSignature)
    }

    fn token(&self, storage_key: &str, expires: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(Self::message(storage_key, expires).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn message(storage_key: &str, expires: i64) -> String {
        format!("{}\n{}", storage_key, expires)
    }
}

fn truncate_to_second(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(at.timestamp(), 0).single().unwrap_or(at)
}

/// A signed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub storage_key: String,
    pub expires_at: DateTime<Utc>,
    pub token: String,
}

impl SignedUrl {
    /// Generate the URL string
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}{}/{}?expires={}&token={}",
            base_url.trim_end_matches('/'),
            SIGNED_OBJECT_PATH,
            self.storage_key,
            self.expires_at.timestamp(),
            self.token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = SignedUrlSigner::new(b"test-secret").unwrap();

        let signed = signer.sign("files/2024/01/1-ab.png", Duration::seconds(60));
        assert!(!signed.token.is_empty());

        assert!(signer
            .verify(&signed.storage_key, signed.expires_at.timestamp(), &signed.token)
            .is_ok());
    }

    #[test]
    fn test_expired_url() {
        let signer = SignedUrlSigner::new(b"test-secret").unwrap();
        let signed = signer.sign("files/a", Duration::seconds(-10));

        assert!(matches!(
            signer.verify("files/a", signed.expires_at.timestamp(), &signed.token),
            Err(FileError::UrlExpired)
        ));
    }

    #[test]
    fn test_token_bound_to_key_and_expiry() {
        let signer = SignedUrlSigner::new(b"test-secret").unwrap();
        let signed = signer.sign("files/a", Duration::seconds(60));
        let expires = signed.expires_at.timestamp();

        assert!(matches!(
            signer.verify("files/b", expires, &signed.token),
            Err(FileError::InvalidSignature)
        ));
        assert!(matches!(
            signer.verify("files/a", expires + 600, &signed.token),
            Err(FileError::InvalidSignature)
        ));
        assert!(matches!(
            signer.verify("files/a", expires, "not base64 !!"),
            Err(FileError::InvalidSignature)
        ));
    }

    #[test]
    fn test_other_secret_rejected() {
        let a = SignedUrlSigner::new(b"one").unwrap();
        let b = SignedUrlSigner::new(b"two").unwrap();
        let signed = a.sign("files/a", Duration::seconds(60));

        assert!(b
            .verify("files/a", signed.expires_at.timestamp(), &signed.token)
            .is_err());
    }

    #[test]
    fn test_empty_secret_refused() {
        assert!(SignedUrlSigner::new(b"").is_err());
    }

    #[test]
    fn test_to_url() {
        let signer = SignedUrlSigner::new(b"secret").unwrap();
        let signed = signer.sign("files/x.txt", Duration::seconds(60));

        let url = signed.to_url("https://files.example.com/");
        assert!(url.starts_with("https://files.example.com/storage/v1/object/sign/files/x.txt?"));
        assert!(url.contains("token="));
        assert!(url.contains(&format!("expires={}", signed.expires_at.timestamp())));
    }
}
