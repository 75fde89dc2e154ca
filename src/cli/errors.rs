//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit and one JSON error
//! object on stderr.

use std::fmt;
use std::io;

use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::AuthError;
use crate::file_storage::FileError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Config file unreadable, invalid, or a bad flag value
    ConfigError,
    /// stdout or filesystem write failed
    IoError,
    AlreadyInitialized,
    NotInitialized,
    /// Runtime, stores or listener could not start
    BootFailed,
    /// A store or token operation failed after startup
    CommandFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SITEVAULT_CLI_CONFIG_ERROR",
            Self::IoError => "SITEVAULT_CLI_IO_ERROR",
            Self::AlreadyInitialized => "SITEVAULT_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "SITEVAULT_CLI_NOT_INITIALIZED",
            Self::BootFailed => "SITEVAULT_CLI_BOOT_FAILED",
            Self::CommandFailed => "SITEVAULT_CLI_COMMAND_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug, Error)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Data directory already initialized",
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Data directory not initialized. Run 'sitevault init' first.",
        )
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    pub fn command_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::CommandFailed, msg)
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// The error object written to stderr before a non-zero exit
    pub fn to_json(&self) -> Value {
        json!({
            "status": "error",
            "code": self.code.code(),
            "message": self.message,
        })
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<FileError> for CliError {
    fn from(e: FileError) -> Self {
        Self::command_failed(e.to_string())
    }
}

/// Unknown roles are a bad flag; anything else is a signing failure
impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UnknownRole(_) => Self::config_error(e.to_string()),
            other => Self::command_failed(other.to_string()),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

pub type CliResult<T> = Result<T, CliError>;
