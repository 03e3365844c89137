//! Session value object and its stable key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One client workstation's slot in the license pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_key: String,
    pub client_id: String,
    pub uuid: String,
    /// Audit field only; never enters the session key.
    pub mac_address: String,
    pub hostname: String,
    pub username: String,
    /// Wall time of first issuance.
    pub assigned_at: DateTime<Utc>,
    /// Wall time of the last activation or touch.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Created false, flipped by activate/deactivate.
    pub active: bool,
}

/// Deterministic session key for a (device, user) pair.
///
/// `SHA-256(lower(uuid) :: lower(hostname) :: lower(client_id))` as lowercase
/// hex. Inputs are trimmed, so keys are stable regardless of the MAC address
/// or username a client happens to report.
pub fn session_key(uuid: &str, hostname: &str, client_id: &str) -> String {
    let canonical = format!(
        "{}::{}::{}",
        uuid.trim().to_lowercase(),
        hostname.trim().to_lowercase(),
        client_id.trim().to_lowercase()
    );
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
