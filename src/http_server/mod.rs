//! # Sitevault HTTP Server
//!
//! Thin axum layer over the file flows.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/api/v1/files` - Upload, list, inspect, sign and delete files
//! - `/storage/v1/object/sign/*key` - Blob download behind a signed URL

pub mod config;
pub mod health_routes;
pub mod server;
pub mod storage_routes;

pub use config::HttpServerConfig;
pub use server::HttpServer;
pub use storage_routes::StorageState;
