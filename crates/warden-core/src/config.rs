//! Appliance configuration.
//!
//! The deployment environment is resolved once by the binary and passed in;
//! the core never reads process environment variables itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Deployment environment, selecting the shared-data folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Map an environment-variable value to an environment. The literal
    /// `Development` selects the development folder; anything else (including
    /// an unset variable) is production.
    pub fn from_name(value: Option<&str>) -> Self {
        match value {
            Some("Development") => Environment::Development,
            _ => Environment::Production,
        }
    }

    /// Folder name under the shared application-data directory. These names
    /// are part of the on-disk contract with existing deployments.
    pub fn folder_name(self) -> &'static str {
        match self {
            Environment::Development => "CyphersolDev",
            Environment::Production => "Cyphersol",
        }
    }
}

/// OS-specific shared application-data directory.
pub fn shared_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Users/Shared")
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("ProgramData")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from("/usr/share")
    }
}

/// Full path of the sealed license artifact for the given environment.
pub fn artifact_path(env: Environment) -> PathBuf {
    shared_data_dir().join(env.folder_name()).join("license.enc")
}

/// Appliance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP control-surface port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// UDP discovery port.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// mDNS re-announce interval in seconds (minimum 10).
    #[serde(default = "default_reannounce_interval")]
    pub reannounce_interval_secs: u64,
    /// How long the record may go without an issuer resync before the
    /// admission gate forces one.
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold_secs: u64,
    /// Clock gap beyond which tampering is suspected.
    #[serde(default = "default_skew_threshold")]
    pub skew_threshold_secs: u64,
    /// Minimum seconds between durable statement-counter flushes.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    /// Base URL of the upstream license issuer.
    #[serde(default = "default_issuer_url")]
    pub issuer_url: String,
    /// API key sent to the issuer in the `X-API-Key` header.
    #[serde(default)]
    pub issuer_api_key: String,
    /// Issuer request timeout in seconds.
    #[serde(default = "default_issuer_timeout")]
    pub issuer_timeout_secs: u64,
    /// Whether to answer database discovery queries and advertise the
    /// database service over mDNS.
    #[serde(default)]
    pub database_discovery: bool,
    /// Database instance identifier included in discovery responses.
    #[serde(default = "default_database_instance")]
    pub database_instance_id: String,
    /// Database server version string included in discovery responses.
    #[serde(default = "default_database_version")]
    pub database_version: String,
    /// Database port included in discovery responses.
    #[serde(default = "default_database_port")]
    pub database_port: u16,
}

fn default_http_port() -> u16 {
    7890
}

fn default_discovery_port() -> u16 {
    41234
}

fn default_reannounce_interval() -> u64 {
    60
}

fn default_staleness_threshold() -> u64 {
    7200
}

fn default_skew_threshold() -> u64 {
    600
}

fn default_flush_interval() -> u64 {
    10
}

fn default_issuer_url() -> String {
    "https://license.cyphersol.com".to_string()
}

fn default_issuer_timeout() -> u64 {
    10
}

fn default_database_instance() -> String {
    "primary".to_string()
}

fn default_database_version() -> String {
    "16".to_string()
}

fn default_database_port() -> u16 {
    5432
}

impl Default for AppConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("empty config deserializes")
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}
