//! # Acting Identity
//!
//! The identity carried with each request. It is supplied by the identity
//! provider and trusted as given; this crate only applies the owner/admin
//! checks in `file_storage::permissions`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::AuthError;

/// Dashboard role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Staff account, sees every file
    Admin,
    /// Client account, sees its own files and its projects' files
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

/// The identity a request acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user id from the identity provider
    pub id: String,
    pub role: Role,
    /// Projects this identity owns or is assigned to
    pub project_ids: Vec<String>,
}

impl Identity {
    /// Create an admin identity
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
            project_ids: Vec::new(),
        }
    }

    /// Create a client identity with no project scope
    pub fn client(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Client,
            project_ids: Vec::new(),
        }
    }

    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_ids = projects.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_project(&self, project_id: &str) -> bool {
        self.project_ids.iter().any(|p| p == project_id)
    }
}
