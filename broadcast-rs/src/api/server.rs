//! API Server - HTTP server for the engine's inbound surface

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::handlers::{self, AppState};
use crate::error::Result;

/// HTTP front for the engine
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>, addr: String) -> Self {
        Self { state, addr }
    }

    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/tiers", get(handlers::list_tiers))
            .route("/api/authorize", post(handlers::authorize))
            .route(
                "/api/operations",
                post(handlers::submit_operation).get(handlers::list_operations),
            )
            .route("/api/operations/:id", get(handlers::get_operation))
            .route("/api/operations/:id/cancel", post(handlers::cancel_operation))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start serving; runs until the listener fails
    pub async fn run(self) -> Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
