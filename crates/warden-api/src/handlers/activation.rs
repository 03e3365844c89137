//! License activation and artifact validation.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use warden_core::{Error, LicenseRecord, clock};

use super::required;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivateLicenseRequest {
    pub license_key: Option<String>,
}

/// Summary of a license record with the key masked; safe to return to
/// clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseSummary {
    pub license_key: String,
    pub expiry_timestamp: i64,
    pub number_of_users: i64,
    pub number_of_statements: i64,
    pub used_statements: i64,
    pub role: String,
}

impl From<&LicenseRecord> for LicenseSummary {
    fn from(record: &LicenseRecord) -> Self {
        Self {
            license_key: record.masked_key(),
            expiry_timestamp: record.expiry_timestamp,
            number_of_users: record.number_of_users,
            number_of_statements: record.number_of_statements,
            used_statements: record.used_statements,
            role: record.role.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateLicenseResponse {
    pub message: &'static str,
    pub license: LicenseSummary,
}

/// Provision the master license: exchange the key with the upstream issuer,
/// seal the returned record to this machine, and install it. Issuer 4xx
/// responses pass through unchanged.
pub async fn activate_license(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivateLicenseRequest>,
) -> Result<Json<ActivateLicenseResponse>, ApiError> {
    let license_key = required(&request.license_key, "licenseKey")?;

    let record = state.issuer.activate(license_key).await?;
    if !record.is_valid() {
        return Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            "issuer returned an unusable license record",
            "issuer_invalid_record",
        ));
    }

    state.store.replace(record)?;
    state.pool.reset_quota_from_record();
    let record = state.store.record();
    info!(key = %record.masked_key(), "license activated");

    Ok(Json(ActivateLicenseResponse {
        message: "license activated",
        license: LicenseSummary::from(&record),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateLicenseResponse {
    pub valid: bool,
    pub license: LicenseSummary,
}

/// Read the sealed artifact fresh from disk and report its state: 404 when
/// no artifact exists, 401 when it cannot be opened on this machine, 403
/// when expired.
pub async fn validate_license(State(state): State<Arc<AppState>>) -> Response {
    let record = match state.store.probe() {
        Ok(record) => record,
        Err(Error::ConfigMissing) => {
            return ApiError::new(
                StatusCode::NOT_FOUND,
                "no license found",
                "license_not_found",
            )
            .into_response();
        }
        Err(Error::CorruptOrTampered) => {
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                "license could not be read on this machine",
                "license_unreadable",
            )
            .into_response();
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    if record.expiry_timestamp < clock::wall_secs() {
        return ApiError::new(StatusCode::FORBIDDEN, "license expired", "license_expired")
            .into_response();
    }

    Json(ValidateLicenseResponse {
        valid: true,
        license: LicenseSummary::from(&record),
    })
    .into_response()
}
