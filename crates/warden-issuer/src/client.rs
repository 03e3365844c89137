//! Upstream issuer REST client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use warden_core::{Error, LicenseRecord, Result, clock};

/// The two collaborators the admission middleware depends on. Both report
/// failure through their return value; neither panics.
#[async_trait]
pub trait UpstreamGuard: Send + Sync {
    /// Refresh the license record from the issuer.
    async fn resync(&self) -> Result<LicenseRecord>;

    /// Report a suspected clock-tampering incident.
    async fn report_tampering(&self, report: TamperReport) -> Result<()>;
}

/// Issuer connection settings.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Base URL of the issuer REST service.
    pub base_url: String,
    /// Value of the `X-API-Key` header.
    pub api_key: String,
    /// Request timeout. An exceeded deadline counts as failure-to-resync.
    pub timeout: Duration,
}

/// Details attached to a clock-tampering report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TamperReport {
    pub license_key: String,
    pub observed_timestamp: i64,
    pub expected_timestamp: i64,
    pub skew_seconds: i64,
    pub hostname: String,
}

/// Device identity sent with activation and resync requests.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
}

impl DeviceInfo {
    pub fn collect() -> Self {
        Self {
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LicenseRequest<'a> {
    license_key: &'a str,
    device_info: &'a DeviceInfo,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct IssuerErrorBody {
    #[serde(default)]
    message: String,
}

/// REST client for the upstream issuer.
pub struct IssuerClient {
    config: IssuerConfig,
    /// The key resyncs and tamper reports are scoped to. Updated when
    /// activation installs a new license.
    license_key: std::sync::RwLock<String>,
    client: reqwest::Client,
}

impl IssuerClient {
    pub fn new(config: IssuerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client with static configuration");
        Self {
            config,
            license_key: std::sync::RwLock::new(String::new()),
            client,
        }
    }

    /// Remember which license key subsequent resyncs refer to.
    pub fn set_license_key(&self, key: &str) {
        *self.license_key.write().unwrap() = key.to_string();
    }

    fn current_key(&self) -> String {
        self.license_key.read().unwrap().clone()
    }

    /// Exchange a license key for a full license record. Issuer 4xx
    /// responses surface as [`Error::Issuer`] so the control surface can
    /// pass the status through.
    pub async fn activate(&self, license_key: &str) -> Result<LicenseRecord> {
        info!("requesting license activation from issuer");
        let record = self.fetch_record("activate", license_key).await?;
        self.set_license_key(&record.license_key);
        Ok(record)
    }

    async fn fetch_record(&self, action: &str, license_key: &str) -> Result<LicenseRecord> {
        let device_info = DeviceInfo::collect();
        let request = LicenseRequest {
            license_key,
            device_info: &device_info,
            timestamp: clock::wall_secs(),
        };

        let url = format!("{}/api/licenses/{}", self.config.base_url, action);
        let response = self
            .client
            .post(&url)
            .header("X-API-Key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<IssuerErrorBody>()
                .await
                .map(|b| b.message)
                .unwrap_or_default();
            error!(%status, action, "issuer rejected request");
            return Err(Error::Issuer {
                status: status.as_u16(),
                message,
            });
        }

        let record: LicenseRecord = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;
        debug!(action, key = %record.masked_key(), "issuer returned record");
        Ok(record)
    }
}

#[async_trait]
impl UpstreamGuard for IssuerClient {
    async fn resync(&self) -> Result<LicenseRecord> {
        let key = self.current_key();
        if key.is_empty() {
            return Err(Error::ResyncFailed("no license key on file".to_string()));
        }
        self.fetch_record("resync", &key)
            .await
            .map_err(|e| match e {
                e @ Error::Issuer { .. } => e,
                other => Error::ResyncFailed(other.to_string()),
            })
    }

    async fn report_tampering(&self, report: TamperReport) -> Result<()> {
        let url = format!("{}/api/licenses/report-tampering", self.config.base_url);
        let result = self
            .client
            .post(&url)
            .header("X-API-Key", &self.config.api_key)
            .json(&report)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                info!(skew = report.skew_seconds, "clock tampering reported");
                Ok(())
            }
            Ok(response) => {
                warn!(status = %response.status(), "tamper report rejected");
                Err(Error::Network(format!(
                    "tamper report rejected: {}",
                    response.status()
                )))
            }
            Err(e) => {
                warn!(error = %e, "tamper report failed");
                Err(Error::Network(e.to_string()))
            }
        }
    }
}
