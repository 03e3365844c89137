//! License info store.
//!
//! Single owner of the sealed artifact and the in-memory license record.
//! Construction is I/O-free; `load` is the explicit, fallible step so that
//! a missing artifact and a corrupt one stay distinguishable to callers.
//! Every mutation rewrites the sealed file synchronously before returning.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, info, warn};
use warden_core::{Error, LicenseRecord, Result, clock};

use crate::codec;

struct StoreState {
    record: LicenseRecord,
    /// Set once an artifact has been decoded or installed.
    loaded: bool,
    /// Monotonic anchor of the last issuer sync (load, resync, activation).
    synced_at: Option<Instant>,
}

/// Process-wide owner of the decoded license record.
pub struct LicenseStore {
    path: PathBuf,
    fingerprint: String,
    state: RwLock<StoreState>,
}

impl LicenseStore {
    /// Create a store bound to an artifact path and machine fingerprint.
    /// Performs no I/O; call [`LicenseStore::load`] to read the artifact.
    pub fn new(path: impl Into<PathBuf>, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
            state: RwLock::new(StoreState {
                record: LicenseRecord::default(),
                loaded: false,
                synced_at: None,
            }),
        }
    }

    /// The artifact path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the sealed artifact.
    ///
    /// A missing file is `ConfigMissing` (the store keeps an empty record
    /// and does not create the file). A file that fails to decrypt or parse
    /// is `CorruptOrTampered` and requires operator action.
    pub fn load(&self) -> Result<()> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "no sealed license artifact; running unactivated");
                return Err(Error::ConfigMissing);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let plaintext = codec::open(&bytes, &self.fingerprint)?;
        let mut record: LicenseRecord =
            serde_json::from_slice(&plaintext).map_err(|_| Error::CorruptOrTampered)?;
        record.system_up_time = clock::monotonic_ms();

        let mut state = self.state.write().unwrap();
        state.record = record;
        state.loaded = true;
        state.synced_at = Some(Instant::now());
        info!(key = %state.record.masked_key(), "license artifact loaded");
        Ok(())
    }

    /// Probe the artifact on disk without touching the in-memory record.
    /// Used by the validation endpoint, which reports missing and corrupt
    /// artifacts distinctly.
    pub fn probe(&self) -> Result<LicenseRecord> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigMissing);
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let plaintext = codec::open(&bytes, &self.fingerprint)?;
        serde_json::from_slice(&plaintext).map_err(|_| Error::CorruptOrTampered)
    }

    /// Snapshot of the current record. Readers see either the previous or
    /// the new record, never a partial one.
    pub fn record(&self) -> LicenseRecord {
        self.state.read().unwrap().record.clone()
    }

    /// Whether an artifact has been decoded or installed this process.
    pub fn is_loaded(&self) -> bool {
        self.state.read().unwrap().loaded
    }

    /// Whether the current record describes a usable license.
    pub fn is_valid(&self) -> bool {
        let state = self.state.read().unwrap();
        state.loaded && state.record.is_valid()
    }

    /// Time since the last issuer sync, if any.
    pub fn elapsed_since_sync(&self) -> Option<std::time::Duration> {
        self.state.read().unwrap().synced_at.map(|t| t.elapsed())
    }

    /// Update the expiry timestamp. Applied only when a record with a
    /// non-empty key is loaded.
    pub fn set_expiry(&self, expiry: i64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        Self::require_loaded(&state)?;
        state.record.expiry_timestamp = expiry;
        self.persist(&state.record)?;
        debug!(expiry, "license expiry updated");
        Ok(())
    }

    /// Update the issuer's notion of "now" and re-stamp the monotonic sync
    /// anchor. Applied only when a record with a non-empty key is loaded.
    pub fn set_server_current_time(&self, timestamp: i64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        Self::require_loaded(&state)?;
        state.record.current_timestamp = timestamp;
        state.record.system_up_time = clock::monotonic_ms();
        state.synced_at = Some(Instant::now());
        self.persist(&state.record)?;
        debug!(timestamp, "server time resynced");
        Ok(())
    }

    /// Mirror the runtime statement counter into the record. Invoked by the
    /// session pool during flush.
    pub fn set_used_statements(&self, used: i64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        Self::require_loaded(&state)?;
        state.record.used_statements = used;
        self.persist(&state.record)?;
        debug!(used, "statement counter flushed");
        Ok(())
    }

    /// Install a full record, e.g. after activation or resync, and persist
    /// it. Stamps the monotonic sync anchor.
    pub fn replace(&self, mut record: LicenseRecord) -> Result<()> {
        record.system_up_time = clock::monotonic_ms();
        let mut state = self.state.write().unwrap();
        self.persist(&record)?;
        state.record = record;
        state.loaded = true;
        state.synced_at = Some(Instant::now());
        info!(key = %state.record.masked_key(), "license record replaced");
        Ok(())
    }

    fn require_loaded(state: &StoreState) -> Result<()> {
        if !state.loaded || state.record.license_key.is_empty() {
            return Err(Error::ConfigMissing);
        }
        Ok(())
    }

    fn persist(&self, record: &LicenseRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let plaintext = serde_json::to_vec(record)?;
        let sealed = codec::seal(&plaintext, &self.fingerprint);
        std::fs::write(&self.path, sealed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FP: &str = "test-host|tester|uid:1000|test-uuid";

    fn record() -> LicenseRecord {
        LicenseRecord {
            license_key: "WARDEN-TEST-KEY-0001".to_string(),
            current_timestamp: clock::wall_secs(),
            expiry_timestamp: clock::wall_secs() + 86_400,
            number_of_users: 3,
            number_of_statements: 50,
            role: "standard".to_string(),
            used_statements: 0,
            system_up_time: 0,
        }
    }

    fn store_in(dir: &TempDir) -> LicenseStore {
        LicenseStore::new(dir.path().join("license.enc"), FP)
    }

    #[test]
    fn test_load_missing_is_config_missing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load(), Err(Error::ConfigMissing)));
        assert!(!store.is_loaded());
        assert!(!store.is_valid());
        // load must not create the file
        assert!(!store.path().exists());
    }

    #[test]
    fn test_replace_then_reload() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.replace(record()).unwrap();
        assert!(store.is_valid());

        let reopened = store_in(&dir);
        reopened.load().unwrap();
        let loaded = reopened.record();
        assert_eq!(loaded.license_key, record().license_key);
        assert_eq!(loaded.number_of_users, 3);
    }

    #[test]
    fn test_load_stamps_sync_anchor() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.replace(record()).unwrap();

        let reopened = store_in(&dir);
        assert!(reopened.elapsed_since_sync().is_none());
        reopened.load().unwrap();
        assert!(reopened.elapsed_since_sync().is_some());
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), b"not a sealed artifact").unwrap();
        assert!(matches!(store.load(), Err(Error::CorruptOrTampered)));
    }

    #[test]
    fn test_wrong_fingerprint_is_tampered() {
        let dir = TempDir::new().unwrap();
        store_in(&dir).replace(record()).unwrap();

        let other = LicenseStore::new(dir.path().join("license.enc"), "other-host|other");
        assert!(matches!(other.load(), Err(Error::CorruptOrTampered)));
    }

    #[test]
    fn test_mutations_require_loaded_record() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.set_expiry(1), Err(Error::ConfigMissing)));
        assert!(matches!(
            store.set_server_current_time(1),
            Err(Error::ConfigMissing)
        ));
        assert!(matches!(
            store.set_used_statements(1),
            Err(Error::ConfigMissing)
        ));
    }

    #[test]
    fn test_set_used_statements_persists() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.replace(record()).unwrap();
        store.set_used_statements(7).unwrap();

        let reopened = store_in(&dir);
        reopened.load().unwrap();
        assert_eq!(reopened.record().used_statements, 7);
    }

    #[test]
    fn test_set_server_current_time_restamps_anchor() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.replace(record()).unwrap();
        let t = clock::wall_secs() + 5;
        store.set_server_current_time(t).unwrap();
        assert_eq!(store.record().current_timestamp, t);
        assert!(store.elapsed_since_sync().unwrap().as_secs() < 2);
    }

    #[test]
    fn test_probe_reports_missing_and_corrupt_distinctly() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.probe(), Err(Error::ConfigMissing)));
        std::fs::write(store.path(), b"garbage").unwrap();
        assert!(matches!(store.probe(), Err(Error::CorruptOrTampered)));
    }
}
