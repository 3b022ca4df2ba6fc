//! `api` crate: HTTP surface over the orchestration core.
//!
//! Exposes:
//!   POST   /api/v1/templates
//!   POST   /api/v1/templates/{id}/operations
//!   POST   /api/v1/templates/{id}/groups
//!   POST   /api/v1/operations/{id}/release
//!   GET    /api/v1/operations/{id}/directives

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use engine::Orchestrator;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the application router with its middleware.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/templates", post(handlers::templates::save))
        .route("/templates/:id/operations", post(handlers::operations::admit))
        .route("/templates/:id/groups", post(handlers::groups::schedule))
        .route("/operations/:id/release", post(handlers::operations::release))
        .route("/operations/:id/directives", get(handlers::operations::directives));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
