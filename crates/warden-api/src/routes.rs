//! API route definitions.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::{activation, health, network, sessions, statements, status};
use crate::middleware;
use crate::state::AppState;

/// Create the main API router. The admission gate wraps every route; the
/// allow-list is enforced inside the gate itself.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/activate-license", post(activation::activate_license))
        .route("/api/validate-license", post(activation::validate_license))
        .route("/api/license/assign", post(sessions::assign))
        .route(
            "/api/license/activate-session",
            post(sessions::activate_session),
        )
        .route(
            "/api/license/deactivate-session",
            post(sessions::deactivate_session),
        )
        .route("/api/license/release", post(sessions::release))
        .route("/api/license/revoke-session", post(sessions::revoke_session))
        .route(
            "/api/license/validate-session",
            post(sessions::validate_session),
        )
        .route("/api/license/use-statement", post(statements::use_statement))
        .route(
            "/api/license/check-statement-limit",
            get(statements::check_statement_limit),
        )
        .route("/api/license/sessions", get(sessions::list_sessions))
        .route("/license/status/all", get(status::status_page))
        .route("/api/health", get(health::health))
        .route("/api/network/ping", get(network::ping))
        .route("/api/network/info", get(network::info))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::admission_gate,
        ))
        .with_state(state)
}
