//! Observability for sitevault
//!
//! - Structured JSON logs through `tracing`
//! - Typed lifecycle events with stable names
//! - Consistency warnings always surface at WARN
//!
//! # Usage
//!
//! ```ignore
//! use sitevault::observability::{Event, Logger};
//!
//! Logger::info(Event::UploadComplete, &[("storage_key", key)]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{render_fields, Logger, Severity};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::file_storage::ConsistencyWarning;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "sitevault=info,tower_http=info";

/// Install the global subscriber on stderr. `json` selects one JSON object per line.
///
/// Calling this twice is harmless; the second call leaves the first subscriber in place.
pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

/// Log a consistency warning under its dedicated event
pub fn log_warning(warning: &ConsistencyWarning) {
    match warning {
        ConsistencyWarning::OrphanBlob {
            storage_key,
            reason,
        } => Logger::warn(
            Event::OrphanBlob,
            &[("storage_key", storage_key.as_str()), ("reason", reason.as_str())],
        ),
        ConsistencyWarning::OrphanMetadata {
            record_id,
            storage_key,
            reason,
        } => {
            let record_id = record_id.to_string();
            Logger::warn(
                Event::OrphanMetadata,
                &[
                    ("record_id", record_id.as_str()),
                    ("storage_key", storage_key.as_str()),
                    ("reason", reason.as_str()),
                ],
            )
        }
    }
}
