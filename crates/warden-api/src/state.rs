//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use warden_issuer::{IssuerClient, UpstreamGuard};
use warden_pool::SessionPool;
use warden_vault::LicenseStore;

/// Settings the handlers and middleware need at request time.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Human-readable server name, surfaced by discovery and status pages.
    pub server_name: String,
    pub http_port: u16,
    pub discovery_port: u16,
    /// Age of the last issuer sync beyond which the gate forces a resync.
    pub staleness_threshold: Duration,
    /// Clock gap beyond which tampering is suspected.
    pub skew_threshold: Duration,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LicenseStore>,
    pub pool: Arc<SessionPool>,
    /// Narrow capability used by the admission gate.
    pub guard: Arc<dyn UpstreamGuard>,
    /// Full issuer client, used only by the activation endpoint.
    pub issuer: Arc<IssuerClient>,
    pub settings: ApiSettings,
    /// Observed so fire-and-forget tasks die with the application.
    pub shutdown: watch::Receiver<bool>,
}
