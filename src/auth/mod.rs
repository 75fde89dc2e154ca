//! # Auth Module
//!
//! Resolves the acting identity of a request from its bearer token. User
//! accounts, sessions and passwords belong to the external identity provider.

pub mod errors;
pub mod identity;
pub mod jwt;

pub use errors::{AuthError, AuthResult};
pub use identity::{Identity, Role};
pub use jwt::{bearer_token, JwtClaims, JwtConfig, JwtManager};
