//! UDP discovery responder.
//!
//! Answers two exact-match queries on a well-known datagram port so clients
//! can locate the appliance (and its database) without mDNS support.
//! Everything else received on the socket is dropped without reply.

use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use warden_core::{Error, Result};

use crate::net::primary_ipv4;

pub const LICENSE_QUERY: &str = "DISCOVER_LICENSE_SERVER";
pub const DATABASE_QUERY: &str = "DISCOVER_POSTGRESQL_SERVER";

/// Receive-error backoff bounds.
const BACKOFF_BASE: std::time::Duration = std::time::Duration::from_millis(50);
const BACKOFF_CAP: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LicenseAnnouncement<'a> {
    name: &'a str,
    host: &'a str,
    ip: String,
    port: u16,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseAnnouncement<'a> {
    name: &'a str,
    host: &'a str,
    ip: String,
    port: u16,
    instance_id: &'a str,
    version: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Answers discovery datagrams. Port mutators are thread-safe and take
/// effect on the next query.
pub struct DiscoveryResponder {
    server_name: String,
    hostname: String,
    license_port: AtomicU16,
    database_port: AtomicU16,
    database_enabled: AtomicBool,
    database_instance_id: String,
    database_version: String,
}

impl DiscoveryResponder {
    pub fn new(
        server_name: impl Into<String>,
        license_port: u16,
        database_port: u16,
        database_instance_id: impl Into<String>,
        database_version: impl Into<String>,
    ) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "warden".to_string());
        Self {
            server_name: server_name.into(),
            hostname,
            license_port: AtomicU16::new(license_port),
            database_port: AtomicU16::new(database_port),
            database_enabled: AtomicBool::new(false),
            database_instance_id: database_instance_id.into(),
            database_version: database_version.into(),
        }
    }

    pub fn update_license_port(&self, port: u16) {
        self.license_port.store(port, Ordering::Relaxed);
    }

    pub fn update_database_port(&self, port: u16) {
        self.database_port.store(port, Ordering::Relaxed);
    }

    pub fn enable_database_discovery(&self) {
        self.database_enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable_database_discovery(&self) {
        self.database_enabled.store(false, Ordering::Relaxed);
    }

    /// Bind the well-known discovery port on all interfaces.
    pub async fn bind(port: u16) -> Result<UdpSocket> {
        UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(Error::Io)
    }

    /// Reply for a received query, or `None` for anything unknown.
    fn respond_to(&self, query: &str) -> Option<String> {
        match query {
            LICENSE_QUERY => serde_json::to_string(&LicenseAnnouncement {
                name: &self.server_name,
                host: &self.hostname,
                ip: primary_ipv4().to_string(),
                port: self.license_port.load(Ordering::Relaxed),
                kind: "license-server",
            })
            .ok(),
            DATABASE_QUERY if self.database_enabled.load(Ordering::Relaxed) => {
                serde_json::to_string(&DatabaseAnnouncement {
                    name: &self.server_name,
                    host: &self.hostname,
                    ip: primary_ipv4().to_string(),
                    port: self.database_port.load(Ordering::Relaxed),
                    instance_id: &self.database_instance_id,
                    version: &self.database_version,
                    kind: "postgresql",
                })
                .ok()
            }
            _ => None,
        }
    }

    /// Serve the socket until shutdown. Receive errors back off
    /// exponentially up to one second; losing the socket ends the loop.
    pub async fn run(
        self: std::sync::Arc<Self>,
        socket: UdpSocket,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let local = socket.local_addr().ok();
        info!(addr = ?local, "discovery responder listening");
        let mut buf = [0u8; 512];
        let mut backoff = BACKOFF_BASE;

        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        backoff = BACKOFF_BASE;
                        let Ok(query) = std::str::from_utf8(&buf[..len]) else {
                            trace!(%peer, "dropping non-utf8 datagram");
                            continue;
                        };
                        match self.respond_to(query.trim()) {
                            Some(reply) => {
                                if let Err(e) = socket.send_to(reply.as_bytes(), peer).await {
                                    warn!(%peer, error = %e, "discovery reply failed");
                                } else {
                                    debug!(%peer, query = query.trim(), "answered discovery query");
                                }
                            }
                            None => trace!(%peer, "dropping unknown discovery query"),
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "discovery receive error");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_CAP);
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("discovery responder stopping");
                        break;
                    }
                }
            }
        }
    }
}
