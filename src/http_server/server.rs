//! # HTTP Server
//!
//! Combines the file, signed-object and health routers into one axum app.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::config::HttpServerConfig;
use super::health_routes::health_routes;
use super::storage_routes::{file_routes, signed_object_routes, StorageState};
use crate::observability::{Event, Logger};

/// Room for multipart framing on top of the largest accepted payload
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// HTTP Server for sitevault
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: Arc<StorageState>) -> Self {
        let router = Self::build_router(&config, state);
        Self { config, router }
    }

    fn build_router(config: &HttpServerConfig, state: Arc<StorageState>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let max_upload = state.files.upload().policy().max_upload_bytes as usize;
        let body_limit = max_upload.saturating_add(MULTIPART_OVERHEAD_BYTES);

        Router::new()
            .merge(health_routes())
            .nest("/api/v1", file_routes(state.clone()))
            .merge(signed_object_routes(state))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the process is stopped
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        Logger::info(
            Event::BootComplete,
            &[
                ("addr", addr.to_string().as_str()),
                ("public_base_url", self.config.public_base_url.as_str()),
            ],
        );

        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
