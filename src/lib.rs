//! sitevault - file storage for site content
//!
//! Blobs go to an Object Store, their descriptions to a Metadata Store, and
//! access is handed out through short-lived signed URLs.

pub mod auth;
pub mod cli;
pub mod file_storage;
pub mod http_server;
pub mod observability;
