//! Session lifecycle handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warden_pool::{AssignOutcome, Session};

use super::required;
use crate::error::ApiError;
use crate::state::AppState;

/// Common body for session endpoints. All fields arrive as strings; which
/// ones are required varies per endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionParams {
    pub client_id: Option<String>,
    pub uuid: Option<String>,
    pub mac_address: Option<String>,
    pub hostname: Option<String>,
    pub username: Option<String>,
}

struct DeviceFields<'a> {
    client_id: &'a str,
    uuid: &'a str,
    mac_address: &'a str,
    hostname: &'a str,
}

fn device_fields(params: &SessionParams) -> Result<DeviceFields<'_>, ApiError> {
    Ok(DeviceFields {
        client_id: required(&params.client_id, "clientId")?,
        uuid: required(&params.uuid, "uuid")?,
        mac_address: required(&params.mac_address, "macAddress")?,
        hostname: required(&params.hostname, "hostname")?,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnvelope {
    pub message: &'static str,
    pub session: Session,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolExhaustedResponse {
    pub error: &'static str,
    pub error_code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inactive_licenses: Vec<Session>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active_licenses: Vec<Session>,
}

/// Create an inactive session, or explain why the pool cannot take one.
pub async fn assign(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SessionParams>,
) -> Result<Response, ApiError> {
    let fields = device_fields(&params)?;
    let username = required(&params.username, "username")?;

    let outcome = state.pool.try_use(
        fields.client_id,
        fields.uuid,
        fields.mac_address,
        fields.hostname,
        username,
    );

    let response = match outcome {
        AssignOutcome::Assigned(session) => Json(SessionEnvelope {
            message: "assigned",
            session,
        })
        .into_response(),
        AssignOutcome::AlreadyAssigned(session) => Json(SessionEnvelope {
            message: "already assigned",
            session,
        })
        .into_response(),
        AssignOutcome::Exhausted { inactive, active } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(PoolExhaustedResponse {
                error: "no available licenses",
                error_code: "capacity_exhausted",
                inactive_licenses: inactive,
                active_licenses: active,
            }),
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn activate_session(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SessionParams>,
) -> Result<Json<SessionEnvelope>, ApiError> {
    let fields = device_fields(&params)?;
    let session = state.pool.activate(
        fields.client_id,
        fields.uuid,
        fields.mac_address,
        fields.hostname,
    )?;
    Ok(Json(SessionEnvelope {
        message: "session activated",
        session,
    }))
}

pub async fn deactivate_session(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SessionParams>,
) -> Result<Json<SessionEnvelope>, ApiError> {
    let fields = device_fields(&params)?;
    let session = state.pool.deactivate(
        fields.client_id,
        fields.uuid,
        fields.mac_address,
        fields.hostname,
    )?;
    Ok(Json(SessionEnvelope {
        message: "session deactivated",
        session,
    }))
}

pub async fn release(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SessionParams>,
) -> Result<Json<SessionEnvelope>, ApiError> {
    let fields = device_fields(&params)?;
    let session = state.pool.release(
        fields.client_id,
        fields.uuid,
        fields.mac_address,
        fields.hostname,
    )?;
    Ok(Json(SessionEnvelope {
        message: "session released",
        session,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevokeParams {
    pub session_key: Option<String>,
}

pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    Json(params): Json<RevokeParams>,
) -> Result<Json<SessionEnvelope>, ApiError> {
    let key = required(&params.session_key, "sessionKey")?;
    let session = state.pool.revoke(key)?;
    Ok(Json(SessionEnvelope {
        message: "session revoked",
        session,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSessionResponse {
    pub valid: bool,
}

/// Membership check: 200 when the (device, client) pair holds a slot, 400
/// otherwise.
pub async fn validate_session(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SessionParams>,
) -> Result<Json<ValidateSessionResponse>, ApiError> {
    let fields = device_fields(&params)?;
    if state.pool.is_valid(
        fields.client_id,
        fields.uuid,
        fields.mac_address,
        fields.hostname,
    ) {
        Ok(Json(ValidateSessionResponse { valid: true }))
    } else {
        Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "no session for this device",
            "session_not_found",
        ))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListResponse {
    pub total: usize,
    pub active: usize,
    pub sessions: Vec<Session>,
}

/// JSON listing backing the dashboard.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    let sessions = state.pool.sessions();
    Json(SessionListResponse {
        total: sessions.len(),
        active: state.pool.active_count(),
        sessions,
    })
}
