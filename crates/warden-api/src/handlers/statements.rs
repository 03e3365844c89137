//! Statement quota handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;
use std::sync::Arc;
use warden_pool::QuotaOutcome;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementUsage {
    pub used: i64,
    pub remaining: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UseStatementResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub usage: StatementUsage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLimitResponse {
    pub error: &'static str,
    pub error_code: &'static str,
    #[serde(flatten)]
    pub usage: StatementUsage,
}

/// Consume one statement from the quota.
pub async fn use_statement(State(state): State<Arc<AppState>>) -> Response {
    match state.pool.try_use_statement() {
        QuotaOutcome::Granted { used, remaining } => Json(UseStatementResponse {
            message: "statement recorded",
            usage: StatementUsage { used, remaining },
        })
        .into_response(),
        QuotaOutcome::LimitReached { used, remaining } => (
            StatusCode::BAD_REQUEST,
            Json(StatementLimitResponse {
                error: "statement limit reached",
                error_code: "statement_limit_reached",
                usage: StatementUsage { used, remaining },
            }),
        )
            .into_response(),
        QuotaOutcome::Unlicensed => ApiError::license_invalid().into_response(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatementLimitResponse {
    pub limit_reached: bool,
    #[serde(flatten)]
    pub usage: StatementUsage,
}

/// Read-only quota check.
pub async fn check_statement_limit(
    State(state): State<Arc<AppState>>,
) -> Json<CheckStatementLimitResponse> {
    Json(CheckStatementLimitResponse {
        limit_reached: state.pool.is_statement_limit_reached(),
        usage: StatementUsage {
            used: state.pool.used_statements(),
            remaining: state.pool.remaining_statements(),
        },
    })
}
