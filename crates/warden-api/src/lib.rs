//! Warden API
//!
//! HTTP control surface for the license appliance: the axum router, the
//! per-request admission middleware, and the handlers that translate
//! between JSON requests and the session pool / license store.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{Router, middleware as axum_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use routes::create_router;
pub use state::{ApiSettings, AppState};

/// Build the complete application router with all middleware.
pub fn build_app(state: Arc<AppState>) -> Router {
    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer())
        .layer(axum_middleware::from_fn(middleware::request_id))
}
