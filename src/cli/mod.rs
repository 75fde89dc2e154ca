//! CLI module for sitevault
//!
//! Provides command-line interface for:
//! - init: Write a config and create the data directory
//! - serve: Start the HTTP server
//! - reconcile: Sweep both stores for orphans
//! - token: Mint a development bearer token

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, reconcile, run, run_command, serve, token};
pub use config::{AuthConfig, Config, StorageConfig};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_error;
