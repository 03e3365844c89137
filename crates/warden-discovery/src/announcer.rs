//! mDNS service announcer.
//!
//! Keeps a table of advertised service profiles and re-registers each of
//! them on a configurable interval so records survive cache expiry on
//! clients. Registration failures are logged and retried on the next tick.

use mdns_sd::{ServiceDaemon, ServiceInfo};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_core::{Error, Result};

pub const LICENSE_SERVICE_TYPE: &str = "_license-server._tcp.local.";
pub const DATABASE_SERVICE_TYPE: &str = "_postgresql._tcp.local.";

/// Re-announce intervals below this are rejected.
pub const MIN_REANNOUNCE_INTERVAL: Duration = Duration::from_secs(10);

const DEFAULT_REANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);

/// One advertised service record.
#[derive(Debug, Clone)]
pub struct ServiceProfile {
    pub service_type: String,
    pub instance: String,
    pub host: String,
    pub port: u16,
    pub properties: HashMap<String, String>,
}

impl ServiceProfile {
    /// Composite key identifying this profile in the announcer table.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.service_type, self.instance, self.port)
    }

    /// Fully-qualified mDNS instance name.
    pub fn fullname(&self) -> String {
        format!("{}.{}", self.instance, self.service_type)
    }
}

struct RunningTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Advertises the appliance (and optionally its database) over mDNS.
pub struct MdnsAnnouncer {
    daemon: ServiceDaemon,
    hostname: String,
    profiles: Mutex<HashMap<String, ServiceProfile>>,
    interval_ms: AtomicU64,
    task: Mutex<Option<RunningTask>>,
}

impl MdnsAnnouncer {
    pub fn new() -> Result<Self> {
        let daemon =
            ServiceDaemon::new().map_err(|e| Error::Network(format!("mdns daemon: {e}")))?;
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "warden".to_string());
        Ok(Self {
            daemon,
            hostname,
            profiles: Mutex::new(HashMap::new()),
            interval_ms: AtomicU64::new(DEFAULT_REANNOUNCE_INTERVAL.as_millis() as u64),
            task: Mutex::new(None),
        })
    }

    /// Advertise the license server itself. Idempotent per
    /// `service-type:instance:port`.
    pub fn advertise_license_service(&self, port: u16) -> Result<()> {
        let profile = ServiceProfile {
            service_type: LICENSE_SERVICE_TYPE.to_string(),
            instance: self.hostname.clone(),
            host: self.hostname.clone(),
            port,
            properties: HashMap::from([
                ("description".to_string(), "Warden license server".to_string()),
                ("ttl".to_string(), "120".to_string()),
            ]),
        };
        self.advertise(profile)
    }

    /// Advertise the embedded database service. Idempotent per
    /// `service-type:instance:port`.
    pub fn advertise_database_service(
        &self,
        instance_id: &str,
        port: u16,
        version: &str,
    ) -> Result<()> {
        let profile = ServiceProfile {
            service_type: DATABASE_SERVICE_TYPE.to_string(),
            instance: instance_id.to_string(),
            host: self.hostname.clone(),
            port,
            properties: HashMap::from([
                ("description".to_string(), "Warden embedded database".to_string()),
                ("ttl".to_string(), "120".to_string()),
                ("version".to_string(), version.to_string()),
                ("instance_id".to_string(), instance_id.to_string()),
            ]),
        };
        self.advertise(profile)
    }

    fn advertise(&self, profile: ServiceProfile) -> Result<()> {
        let key = profile.key();
        self.register(&profile)?;
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.insert(key.clone(), profile).is_none() {
            info!(%key, "service advertised");
        }
        Ok(())
    }

    /// Withdraw a previously advertised profile by composite key. Unknown
    /// keys are a no-op.
    pub fn unregister(&self, key: &str) -> Result<()> {
        let profile = self.profiles.lock().unwrap().remove(key);
        let Some(profile) = profile else {
            debug!(%key, "unregister for unknown profile");
            return Ok(());
        };
        self.daemon
            .unregister(&profile.fullname())
            .map_err(|e| Error::Network(format!("mdns unregister: {e}")))?;
        info!(%key, "service withdrawn");
        Ok(())
    }

    /// Change the background re-announce interval.
    pub fn set_reannounce_interval(&self, interval: Duration) -> Result<()> {
        if interval < MIN_REANNOUNCE_INTERVAL {
            return Err(Error::InvalidParameters {
                field: "reannounce_interval".to_string(),
            });
        }
        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Push every registered profile out again. The profile table itself is
    /// never modified by a re-announce.
    pub fn re_announce_all(&self) {
        let snapshot: Vec<ServiceProfile> =
            self.profiles.lock().unwrap().values().cloned().collect();
        for profile in snapshot {
            if let Err(e) = self.register(&profile) {
                // next tick retries
                warn!(key = %profile.key(), error = %e, "re-announce failed");
            } else {
                debug!(key = %profile.key(), "re-announced");
            }
        }
    }

    fn register(&self, profile: &ServiceProfile) -> Result<()> {
        let service = ServiceInfo::new(
            &profile.service_type,
            &profile.instance,
            &format!("{}.local.", profile.host),
            "",
            profile.port,
            profile.properties.clone(),
        )
        .map_err(|e| Error::Network(format!("mdns record: {e}")))?
        .enable_addr_auto();

        self.daemon
            .register(service)
            .map_err(|e| Error::Network(format!("mdns register: {e}")))
    }

    /// Begin answering queries and start the periodic re-announce task.
    /// Call on an `Arc`-held announcer; starting twice is a no-op.
    pub fn start(self: std::sync::Arc<Self>) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let announcer = std::sync::Arc::clone(&self);
        let handle = tokio::spawn(async move {
            info!("mdns re-announce loop started");
            loop {
                let interval =
                    Duration::from_millis(announcer.interval_ms.load(Ordering::Relaxed));
                tokio::select! {
                    _ = tokio::time::sleep(interval) => announcer.re_announce_all(),
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("mdns re-announce loop stopping");
                            break;
                        }
                    }
                }
            }
        });
        *task = Some(RunningTask {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the periodic task within a bounded wait, shut the daemon down,
    /// and clear the profile table. Safe to call more than once.
    pub async fn stop(&self) {
        let running = self.task.lock().unwrap().take();
        if let Some(running) = running {
            let _ = running.shutdown_tx.send(true);
            if tokio::time::timeout(Duration::from_secs(2), running.handle)
                .await
                .is_err()
            {
                warn!("mdns re-announce loop did not stop in time");
            }
        }
        self.profiles.lock().unwrap().clear();
        if let Err(e) = self.daemon.shutdown() {
            debug!(error = %e, "mdns daemon already shut down");
        }
    }
}
