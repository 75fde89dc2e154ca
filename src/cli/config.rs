//! Configuration file and environment overrides
//!
//! The file is JSON with three sections (`server`, `storage`, `auth`), every
//! field defaulted. After parsing, `SITEVAULT_*` environment variables win,
//! then the result is validated.

use std::fs;
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::auth::JwtConfig;
use crate::file_storage::UploadPolicy;
use crate::http_server::HttpServerConfig;

/// Longest signed URL lifetime accepted
const MAX_SIGNED_URL_TTL_SECS: i64 = 3600;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Empty allows every type
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,

    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: i64,

    /// HMAC key for signed object URLs
    #[serde(default)]
    pub signing_secret: String,

    /// Deadline for each Object Store or Metadata Store call
    #[serde(default = "default_store_call_timeout")]
    pub store_call_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    #[serde(default = "default_issuer")]
    pub audience: String,

    /// Lifetime of tokens minted by `sitevault token`
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024 // 50MB
}

fn default_signed_url_ttl() -> i64 {
    60
}

fn default_store_call_timeout() -> u64 {
    10_000
}

fn default_issuer() -> String {
    "sitevault".to_string()
}

fn default_token_ttl() -> i64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_mime_types: Vec::new(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            signing_secret: String::new(),
            store_call_timeout_ms: default_store_call_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_issuer(),
            audience: default_issuer(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl Config {
    /// Load configuration from file, apply environment overrides, validate
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Fresh config with random secrets, as written by `sitevault init`
    pub fn generate() -> Self {
        let mut config = Config::default();
        config.storage.signing_secret = random_secret();
        config.auth.jwt_secret = random_secret();
        config
    }

    /// Apply `SITEVAULT_*` overrides using `lookup` to read variables
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CliResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SITEVAULT_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("SITEVAULT_SERVER_PORT") {
            self.server.port = parse_var("SITEVAULT_SERVER_PORT", &val)?;
        }
        if let Some(val) = lookup("SITEVAULT_PUBLIC_BASE_URL") {
            self.server.public_base_url = val;
        }
        if let Some(val) = lookup("SITEVAULT_CORS_ORIGINS") {
            self.server.cors_origins = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }

        if let Some(val) = lookup("SITEVAULT_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Some(val) = lookup("SITEVAULT_MAX_UPLOAD_BYTES") {
            self.storage.max_upload_bytes = parse_var("SITEVAULT_MAX_UPLOAD_BYTES", &val)?;
        }
        if let Some(val) = lookup("SITEVAULT_SIGNED_URL_TTL_SECS") {
            self.storage.signed_url_ttl_secs = parse_var("SITEVAULT_SIGNED_URL_TTL_SECS", &val)?;
        }
        if let Some(val) = lookup("SITEVAULT_SIGNING_SECRET") {
            self.storage.signing_secret = val;
        }
        if let Some(val) = lookup("SITEVAULT_STORE_CALL_TIMEOUT_MS") {
            self.storage.store_call_timeout_ms =
                parse_var("SITEVAULT_STORE_CALL_TIMEOUT_MS", &val)?;
        }

        if let Some(val) = lookup("SITEVAULT_JWT_SECRET") {
            self.auth.jwt_secret = val;
        }

        Ok(())
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(CliError::config_error("storage.data_dir is required"));
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(CliError::config_error("storage.max_upload_bytes must be > 0"));
        }
        if !(1..=MAX_SIGNED_URL_TTL_SECS).contains(&self.storage.signed_url_ttl_secs) {
            return Err(CliError::config_error(format!(
                "storage.signed_url_ttl_secs must be between 1 and {}",
                MAX_SIGNED_URL_TTL_SECS
            )));
        }
        if self.storage.signing_secret.is_empty() {
            return Err(CliError::config_error("storage.signing_secret is required"));
        }
        if self.storage.store_call_timeout_ms == 0 {
            return Err(CliError::config_error(
                "storage.store_call_timeout_ms must be > 0",
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(CliError::config_error("auth.jwt_secret is required"));
        }
        if self.auth.token_ttl_secs <= 0 {
            return Err(CliError::config_error("auth.token_ttl_secs must be > 0"));
        }
        let base = &self.server.public_base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(CliError::config_error(format!(
                "server.public_base_url must be an http(s) URL, got '{}'",
                base
            )));
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.storage.data_dir)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_path().join("objects")
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.data_path().join("metadata").join("files.json")
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            allowed_mime_types: self.storage.allowed_mime_types.clone(),
            max_upload_bytes: self.storage.max_upload_bytes,
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.auth.jwt_secret.clone(),
            token_ttl: chrono::Duration::seconds(self.auth.token_ttl_secs),
            issuer: self.auth.issuer.clone(),
            audience: self.auth.audience.clone(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> CliResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::config_error(format!("Invalid value for {}: '{}'", name, value)))
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_generated_config_is_valid() {
        let config = Config::generate();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.signed_url_ttl_secs, 60);
        assert_eq!(config.storage.signing_secret.len(), 64);
        assert_ne!(config.storage.signing_secret, config.auth.jwt_secret);
    }

    #[test]
    fn test_missing_secrets_rejected() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_ttl_bounds() {
        let mut config = Config::generate();
        config.storage.signed_url_ttl_secs = 3601;
        assert!(config.validate().is_err());
        config.storage.signed_url_ttl_secs = 0;
        assert!(config.validate().is_err());
        config.storage.signed_url_ttl_secs = 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::generate();
        config
            .apply_overrides(lookup(&[
                ("SITEVAULT_SERVER_PORT", "9000"),
                ("SITEVAULT_DATA_DIR", "/srv/sitevault"),
                ("SITEVAULT_CORS_ORIGINS", "https://a.example, https://b.example"),
                ("SITEVAULT_SIGNED_URL_TTL_SECS", "300"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.data_path(), Path::new("/srv/sitevault"));
        assert_eq!(
            config.server.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.storage.signed_url_ttl_secs, 300);
        assert_eq!(
            config.metadata_file(),
            Path::new("/srv/sitevault/metadata/files.json")
        );
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = Config::generate();
        let err = config
            .apply_overrides(lookup(&[("SITEVAULT_SERVER_PORT", "eighty")]))
            .unwrap_err();
        assert_eq!(err.code_str(), "SITEVAULT_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sitevault.json");
        fs::write(
            &path,
            r#"{
                "storage": { "signing_secret": "s1", "allowed_mime_types": ["image/*"] },
                "auth": { "jwt_secret": "j1" }
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.upload_policy().allowed_mime_types, vec!["image/*"]);
        assert_eq!(config.jwt_config().issuer, "sitevault");
    }
}
