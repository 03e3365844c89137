//! Network self-test handlers. Allow-listed so clients can probe
//! connectivity before the appliance is activated.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;
use warden_core::clock;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub status: &'static str,
    pub timestamp: i64,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        timestamp: clock::wall_secs(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfoResponse {
    pub name: String,
    pub hostname: String,
    pub ip: String,
    pub http_port: u16,
    pub discovery_port: u16,
}

pub async fn info(State(state): State<Arc<AppState>>) -> Json<NetworkInfoResponse> {
    Json(NetworkInfoResponse {
        name: state.settings.server_name.clone(),
        hostname: hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string()),
        ip: warden_discovery::primary_ipv4().to_string(),
        http_port: state.settings.http_port,
        discovery_port: state.settings.discovery_port,
    })
}
