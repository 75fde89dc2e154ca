//! Structured event logger
//!
//! Thin facade over `tracing`:
//! - explicit severity levels
//! - one log line = one event
//! - event fields rendered with deterministic key ordering

use std::collections::BTreeMap;
use std::fmt;

use super::events::Event;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Normal operations
    Info = 0,
    /// Recoverable issues, including consistency warnings
    Warn = 1,
    /// Operation failures
    Error = 2,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: Event, fields: &[(&str, &str)]) {
        let fields = render_fields(fields);
        let name = event.as_str();

        match severity {
            Severity::Info => tracing::info!(event = name, fields = %fields),
            Severity::Warn => tracing::warn!(event = name, fields = %fields),
            Severity::Error => tracing::error!(event = name, fields = %fields),
        }
    }

    pub fn info(event: Event, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: Event, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: Event, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Render fields as a JSON object with keys sorted alphabetically
pub fn render_fields(fields: &[(&str, &str)]) -> String {
    let sorted: BTreeMap<&str, &str> = fields.iter().copied().collect();
    serde_json::to_string(&sorted).unwrap_or_else(|_| "{}".to_string())
}
