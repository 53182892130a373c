//! HTTP server for the document Q&A service

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::Result;
use state::AppState;

/// Document Q&A HTTP server
pub struct DocQaServer {
    config: RagConfig,
    state: AppState,
}

impl DocQaServer {
    /// Create a new server
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| crate::error::Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state);

        tracing::info!("Starting docqa server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| crate::error::Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let server = &state.config().server;
    let enable_cors = server.enable_cors;

    let router = Router::new()
        .route("/health", get(health_check))
        .merge(routes::api_routes(server.max_upload_size))
        .with_state(state)
        // Middleware layers (order matters - applied bottom to top)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        // CORS must be outermost
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
