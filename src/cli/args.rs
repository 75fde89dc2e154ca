//! CLI argument definitions using clap
//!
//! Commands:
//! - sitevault init --config <path>
//! - sitevault serve --config <path>
//! - sitevault reconcile --config <path> [--apply]
//! - sitevault token --config <path> --sub <id> [--role admin|client] [--project <id>]...

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sitevault - file storage for site content
#[derive(Parser, Debug)]
#[command(name = "sitevault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as plain text instead of JSON
    #[arg(long, global = true)]
    pub plain_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config (if absent) and create the data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./sitevault.json")]
        config: PathBuf,
    },

    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./sitevault.json")]
        config: PathBuf,
    },

    /// Report blobs and metadata rows missing their counterpart
    Reconcile {
        /// Path to configuration file
        #[arg(long, default_value = "./sitevault.json")]
        config: PathBuf,

        /// Delete the orphans found instead of only reporting them
        #[arg(long)]
        apply: bool,

        /// Ignore anything younger than this many seconds
        #[arg(long, default_value_t = 600)]
        grace_secs: i64,
    },

    /// Mint a bearer token for development
    Token {
        /// Path to configuration file
        #[arg(long, default_value = "./sitevault.json")]
        config: PathBuf,

        /// Subject (user id)
        #[arg(long)]
        sub: String,

        /// Role: admin or client
        #[arg(long, default_value = "client")]
        role: String,

        /// Project the subject belongs to (repeatable)
        #[arg(long = "project")]
        projects: Vec<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
