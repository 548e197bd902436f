//! HTTP surface for the persona twin.
//!
//! A thin axum layer around [`TwinOrchestrator`]: it validates requests,
//! hands them to the pipeline, and maps failures onto status codes.
//!
//! # Endpoints
//!
//! - `GET /health` - store reachability (`healthy` or `degraded`)
//! - `POST /api/v1/chat` - one conversation turn
//!
//! ```text
//! Client
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   twin-api      │ ◄── This crate
//! │    (Axum)       │
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ TwinOrchestrator│
//! └─────────────────┘
//! ```
//!
//! [`TwinOrchestrator`]: twin_orchestrator::TwinOrchestrator

pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use routes::ApiError;
pub use state::AppState;

/// Request bodies above this size are rejected before parsing.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

/// Create the API router. An empty origin list allows any origin.
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/chat", post(routes::chat))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    cors_origins: &[String],
) -> anyhow::Result<()> {
    let router = create_router(state, cors_origins);

    info!(%addr, "Starting twin API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
