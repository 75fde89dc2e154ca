//! # Auth Errors
//!
//! Error types for bearer-token identity resolution.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No bearer token on the request
    #[error("Authentication required")]
    AuthenticationRequired,

    /// JWT token is malformed
    #[error("Malformed token")]
    MalformedToken,

    /// JWT token has expired
    #[error("Token expired")]
    TokenExpired,

    /// JWT signature is invalid
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Claims carry a role this service does not know
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::TokenGenerationFailed => 500,
            _ => 401,
        }
    }
}
