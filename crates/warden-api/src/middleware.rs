//! HTTP middleware: the per-request admission gate plus ambient layers.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::clock;
use warden_issuer::{DeviceInfo, TamperReport};

use crate::error::ApiError;
use crate::state::AppState;

/// Endpoints that must work before (or without) a valid license: activation,
/// artifact validation, liveness, the dashboard, and the network self-tests.
/// Matching is a case-insensitive prefix check.
const ALLOW_LIST: &[&str] = &[
    "/api/activate-license",
    "/api/validate-license",
    "/api/health",
    "/license/status",
    "/api/network/ping",
    "/api/network/info",
];

fn is_allow_listed(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    ALLOW_LIST.iter().any(|prefix| path.starts_with(prefix))
}

/// Gate every request on license validity, freshness, clock sanity, and
/// expiry. Runs before every handler except the allow-list.
pub async fn admission_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if is_allow_listed(request.uri().path()) {
        return next.run(request).await;
    }

    if !state.store.is_valid() {
        return ApiError::license_invalid().into_response();
    }

    // Staleness: force a resync once the record has gone too long without
    // hearing from the issuer.
    let stale = state
        .store
        .elapsed_since_sync()
        .map(|e| e > state.settings.staleness_threshold)
        .unwrap_or(true);
    if stale {
        match state.guard.resync().await {
            Ok(record) => {
                debug!("stale license resynced");
                if let Err(e) = state.store.replace(record) {
                    return ApiError::from(e).into_response();
                }
                state.pool.reset_quota_from_record();
            }
            Err(e) => {
                warn!(error = %e, "license resync failed");
                return ApiError::from(warden_core::Error::ResyncFailed(e.to_string()))
                    .into_response();
            }
        }
    }

    // Clock skew: compare the wall clock against the issuer clock projected
    // forward on the monotonic clock. A large gap in either direction means
    // somebody moved the clock.
    let record = state.store.record();
    let elapsed_secs = state
        .store
        .elapsed_since_sync()
        .map(|e| e.as_secs() as i64)
        .unwrap_or(0);
    let expected_now = record.current_timestamp + elapsed_secs;
    let wall_now = clock::wall_secs();
    let skew = wall_now - expected_now;
    if skew.unsigned_abs() >= state.settings.skew_threshold.as_secs() {
        warn!(skew, "clock skew beyond threshold, rejecting request");
        spawn_tamper_report(&state, &record.license_key, wall_now, expected_now, skew);
        // Deliberately the same response as an invalid license.
        return ApiError::license_invalid().into_response();
    }

    if record.expiry_timestamp < wall_now {
        return ApiError::from(warden_core::Error::Expired).into_response();
    }

    next.run(request).await
}

/// Fire-and-forget tamper report. Must not block the request; dies with the
/// application via the shutdown channel.
fn spawn_tamper_report(
    state: &Arc<AppState>,
    license_key: &str,
    observed: i64,
    expected: i64,
    skew: i64,
) {
    let guard = state.guard.clone();
    let mut shutdown = state.shutdown.clone();
    let report = TamperReport {
        license_key: license_key.to_string(),
        observed_timestamp: observed,
        expected_timestamp: expected,
        skew_seconds: skew,
        hostname: DeviceInfo::collect().hostname,
    };
    tokio::spawn(async move {
        tokio::select! {
            result = guard.report_tampering(report) => {
                if let Err(e) = result {
                    warn!(error = %e, "tamper report not delivered");
                }
            }
            _ = shutdown.changed() => {}
        }
    });
}

/// Create CORS middleware layer.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}

/// Inject a request ID into each request and response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    if let Ok(value) = request_id.parse() {
        request.headers_mut().insert("x-request-id", value);
    }

    let mut response = next.run(request).await;
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_matches_prefix_case_insensitively() {
        assert!(is_allow_listed("/api/health"));
        assert!(is_allow_listed("/API/Health"));
        assert!(is_allow_listed("/license/status/all"));
        assert!(is_allow_listed("/api/network/ping"));
        assert!(is_allow_listed("/api/activate-license"));
        assert!(is_allow_listed("/api/validate-license"));
    }

    #[test]
    fn test_gated_paths_are_not_allow_listed() {
        assert!(!is_allow_listed("/api/license/assign"));
        assert!(!is_allow_listed("/api/license/use-statement"));
        assert!(!is_allow_listed("/api/license/sessions"));
    }
}
