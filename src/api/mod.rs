//! API module
//!
//! Thin axum adapter over the ledger engine.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::engine::LedgerEngine;
use crate::notify::EventNotifier;
use crate::store::LedgerRepository;

pub use routes::{create_router, SharedEngine};

/// Build the application router
pub fn build_router<S, N>(engine: Arc<LedgerEngine<S, N>>) -> Router
where
    S: LedgerRepository + 'static,
    N: EventNotifier + 'static,
{
    // Layers run last-added first: context -> logging -> handler
    let api_routes = create_router::<S, N>()
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::context_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
