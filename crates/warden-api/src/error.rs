//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use warden_core::Error;

/// JSON error body. `error_code` is machine-readable; for parameter errors
/// it names the first missing field.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// The deliberately non-specific 403 used for invalid records and for
    /// suspected clock tampering; the two must be indistinguishable.
    pub fn license_invalid() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "license is invalid or not found",
            "license_invalid",
        )
    }

    pub fn missing_parameter(field: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            format!("missing or empty parameter: {field}"),
            format!("missing_{field}"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            error_code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::ConfigMissing => ApiError::license_invalid(),
            Error::CorruptOrTampered => ApiError::new(
                StatusCode::FORBIDDEN,
                "license is invalid or not found",
                "license_invalid",
            ),
            Error::CapacityExhausted => ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "no available licenses",
                "capacity_exhausted",
            ),
            Error::SessionNotFound(key) => ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("session not found: {key}"),
                "session_not_found",
            ),
            Error::ActiveSession => ApiError::new(
                StatusCode::BAD_REQUEST,
                "session is active and cannot be revoked",
                "session_active",
            ),
            Error::SkewDetected => ApiError::license_invalid(),
            Error::ResyncFailed(_) => ApiError::new(
                StatusCode::FORBIDDEN,
                "please connect to the network",
                "resync_failed",
            ),
            Error::Expired => {
                ApiError::new(StatusCode::FORBIDDEN, "license expired", "license_expired")
            }
            Error::InvalidParameters { field } => ApiError::missing_parameter(&field),
            Error::Issuer { status, message } => ApiError::new(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                if message.is_empty() {
                    "license issuer rejected the request".to_string()
                } else {
                    message
                },
                "issuer_rejected",
            ),
            Error::Network(msg) => {
                ApiError::new(StatusCode::BAD_GATEWAY, msg, "issuer_unreachable")
            }
            Error::Io(_) | Error::Serialization(_) | Error::Internal(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
                "internal",
            ),
        }
    }
}
