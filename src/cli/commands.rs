//! CLI command implementations
//!
//! Each command loads the config, builds what it needs and prints one JSON
//! object to stdout. Async work runs on a runtime owned by the command.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::args::{Cli, Command};
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::write_response;
use crate::auth::{Identity, JwtManager, Role};
use crate::file_storage::{
    FileService, FileStores, JsonFileMetadataStore, LocalObjectStore, SignedUrlSigner, UrlIssuer,
};
use crate::http_server::{HttpServer, StorageState};
use crate::observability::{init_logging, Event, Logger};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(!cli.plain_logs);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config } => serve(&config),
        Command::Reconcile {
            config,
            apply,
            grace_secs,
        } => reconcile(&config, apply, grace_secs),
        Command::Token {
            config,
            sub,
            role,
            projects,
        } => token(&config, &sub, &role, projects),
    }
}

/// Write a config with fresh secrets if none exists, then lay out the data directory
pub fn init(config_path: &Path) -> CliResult<()> {
    let created_config = !config_path.exists();
    if created_config {
        let content = serde_json::to_string_pretty(&Config::generate())?;
        fs::write(config_path, content).map_err(|e| {
            CliError::config_error(format!("Failed to write {:?}: {}", config_path, e))
        })?;
    }

    let config = Config::load(config_path)?;
    if is_initialized(&config) {
        return Err(CliError::already_initialized());
    }

    let metadata_dir = config
        .metadata_file()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.data_path().to_path_buf());
    let dirs = [config.objects_dir(), metadata_dir];
    for dir in &dirs {
        fs::create_dir_all(dir).map_err(|e| {
            CliError::config_error(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }

    fs::write(
        config.metadata_file(),
        serde_json::to_string_pretty(&json!({"version": 1, "files": []}))?,
    )?;

    write_response(json!({
        "initialized": true,
        "config_created": created_config,
        "data_dir": config.storage.data_dir,
    }))
}

/// Start the HTTP server
pub fn serve(config_path: &Path) -> CliResult<()> {
    Logger::info(Event::BootStart, &[]);
    let config = load_initialized(config_path)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let (files, signer) = build_service(&config).await?;
        let state = StorageState::new(files, JwtManager::new(config.jwt_config()), signer);
        let server = HttpServer::new(config.server.clone(), Arc::new(state));

        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Report (and with `apply`, remove) orphan blobs and metadata rows
pub fn reconcile(config_path: &Path, apply: bool, grace_secs: i64) -> CliResult<()> {
    if grace_secs < 0 {
        return Err(CliError::config_error("--grace-secs must be >= 0"));
    }
    let config = load_initialized(config_path)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    let report = rt.block_on(async {
        let (files, _) = build_service(&config).await?;
        let report = files
            .reconciler(chrono::Duration::seconds(grace_secs))
            .run(apply)
            .await?;
        Ok::<_, CliError>(report)
    })?;

    write_response(serde_json::to_value(&report)?)
}

/// Mint a bearer token for local development
pub fn token(config_path: &Path, sub: &str, role: &str, projects: Vec<String>) -> CliResult<()> {
    let config = Config::load(config_path)?;

    let role: Role = role.parse()?;
    if sub.trim().is_empty() {
        return Err(CliError::config_error("--sub must not be empty"));
    }

    let identity = Identity {
        id: sub.to_string(),
        role,
        project_ids: projects,
    };
    let token = JwtManager::new(config.jwt_config()).issue_token(&identity)?;

    write_response(json!({
        "token": token,
        "expires_in": config.auth.token_ttl_secs,
    }))
}

fn is_initialized(config: &Config) -> bool {
    config.metadata_file().exists()
}

fn load_initialized(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    if !is_initialized(&config) {
        return Err(CliError::not_initialized());
    }
    Logger::info(
        Event::ConfigLoaded,
        &[
            ("data_dir", config.storage.data_dir.as_str()),
            ("public_base_url", config.server.public_base_url.as_str()),
        ],
    );
    Ok(config)
}

/// Open the on-disk stores and wire them into a file service.
///
/// The returned signer holds the same key the Object Store signs with.
async fn build_service(config: &Config) -> CliResult<(FileService, SignedUrlSigner)> {
    let signer = SignedUrlSigner::new(config.storage.signing_secret.as_bytes())
        .map_err(|e| CliError::config_error(e.to_string()))?;

    let objects = LocalObjectStore::new(
        config.objects_dir(),
        UrlIssuer::new(signer.clone(), config.server.public_base_url.clone()),
    );
    let metadata = JsonFileMetadataStore::open(config.metadata_file())
        .await
        .map_err(|e| CliError::boot_failed(format!("Failed to open metadata store: {}", e)))?;

    let stores = FileStores::new(Arc::new(objects), Arc::new(metadata))
        .with_call_timeout(Duration::from_millis(config.storage.store_call_timeout_ms));

    let files = FileService::new(
        stores,
        config.upload_policy(),
        chrono::Duration::seconds(config.storage.signed_url_ttl_secs),
    );
    Ok((files, signer))
}
