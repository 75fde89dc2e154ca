//! # File Permissions
//!
//! One capability check decides who may touch a record: admins always, other
//! identities when they own the record or the record's project is in their
//! scope.

use super::errors::{FileError, FileResult};
use super::metadata::VisibilityScope;
use super::record::FileRecord;
use crate::auth::Identity;
use crate::observability::{Event, Logger};

/// Check whether `identity` may read or delete `record`
pub fn can_access(identity: &Identity, record: &FileRecord) -> bool {
    if identity.is_admin() {
        return true;
    }
    if record.owner_id == identity.id {
        return true;
    }
    record
        .project_id
        .as_deref()
        .map(|project| identity.has_project(project))
        .unwrap_or(false)
}

/// Check whether `identity` may file an upload under `project_id`
pub fn can_attach_project(identity: &Identity, project_id: &str) -> bool {
    identity.is_admin() || identity.has_project(project_id)
}

/// The listing filter for `identity`; `None` means unrestricted
pub fn visibility_scope(identity: &Identity) -> Option<VisibilityScope> {
    if identity.is_admin() {
        None
    } else {
        Some(VisibilityScope {
            owner_id: identity.id.clone(),
            project_ids: identity.project_ids.clone(),
        })
    }
}

/// [`can_access`] as a result, logging refusals
pub fn authorize(identity: &Identity, record: &FileRecord) -> FileResult<()> {
    if can_access(identity, record) {
        return Ok(());
    }

    Logger::warn(
        Event::AccessDenied,
        &[
            ("identity", identity.id.as_str()),
            ("record_id", record.id.to_string().as_str()),
        ],
    );
    Err(FileError::AccessDenied)
}
