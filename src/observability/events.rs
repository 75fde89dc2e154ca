//! Observable events for sitevault
//!
//! Every lifecycle point worth logging has a typed event with a stable name.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Server startup begins
    BootStart,
    /// Server listening
    BootComplete,
    /// Configuration loaded
    ConfigLoaded,

    // Upload
    /// Blob and metadata both written
    UploadComplete,
    /// Upload rejected or failed
    UploadFailed,
    /// Blob removed after its metadata insert failed
    UploadCompensated,

    // Access
    /// Signed URL handed out
    SignedUrlIssued,
    /// Signed object served
    SignedObjectServed,
    /// Request refused by the capability check
    AccessDenied,

    // Deletion
    /// Blob and metadata both removed
    DeleteComplete,
    /// Delete aborted before touching metadata
    DeleteFailed,

    // Consistency
    /// Blob with no metadata row left behind
    OrphanBlob,
    /// Metadata row with no blob left behind
    OrphanMetadata,

    // Reconciliation
    /// Reconciliation sweep started
    ReconcileStart,
    /// Reconciliation sweep finished
    ReconcileComplete,
}

impl Event {
    /// Returns the string representation for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "SITEVAULT_STARTUP_BEGIN",
            Event::BootComplete => "SITEVAULT_STARTUP_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::UploadComplete => "UPLOAD_COMPLETE",
            Event::UploadFailed => "UPLOAD_FAILED",
            Event::UploadCompensated => "UPLOAD_COMPENSATED",

            Event::SignedUrlIssued => "SIGNED_URL_ISSUED",
            Event::SignedObjectServed => "SIGNED_OBJECT_SERVED",
            Event::AccessDenied => "ACCESS_DENIED",

            Event::DeleteComplete => "DELETE_COMPLETE",
            Event::DeleteFailed => "DELETE_FAILED",

            Event::OrphanBlob => "ORPHAN_BLOB",
            Event::OrphanMetadata => "ORPHAN_METADATA",

            Event::ReconcileStart => "RECONCILE_BEGIN",
            Event::ReconcileComplete => "RECONCILE_COMPLETE",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
