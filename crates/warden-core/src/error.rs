//! Error types for the Warden license appliance.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Vault errors
    #[error("no sealed license artifact found")]
    ConfigMissing,

    #[error("license artifact is corrupt or bound to another machine")]
    CorruptOrTampered,

    // Session pool errors
    #[error("no available licenses")]
    CapacityExhausted,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session is active and cannot be revoked")]
    ActiveSession,

    // Admission errors
    #[error("system clock mismatch detected")]
    SkewDetected,

    #[error("could not refresh license from the issuer: {0}")]
    ResyncFailed(String),

    #[error("license expired")]
    Expired,

    // Request errors
    #[error("missing or empty parameter: {field}")]
    InvalidParameters { field: String },

    // Upstream issuer errors
    #[error("issuer rejected the request ({status}): {message}")]
    Issuer { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
