//! JSON output for CLI commands
//!
//! Each command prints one JSON object to stdout. Logs and error objects go
//! to stderr.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write a failed command's error object to stderr
pub fn write_error(error: &CliError) -> CliResult<()> {
    let mut stderr = io::stderr();
    serde_json::to_writer(&mut stderr, &error.to_json())?;
    writeln!(stderr)?;

    Ok(())
}
