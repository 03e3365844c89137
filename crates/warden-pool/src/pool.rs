//! The capped session pool and statement quota.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};
use warden_core::{Error, Result, UNLIMITED_STATEMENTS};
use warden_vault::LicenseStore;

use crate::session::{Session, session_key};

/// Result of a `try_use` call.
#[derive(Debug, Clone)]
pub enum AssignOutcome {
    /// A new inactive session was created.
    Assigned(Session),
    /// The same (device, client) pair already holds a slot.
    AlreadyAssigned(Session),
    /// The pool is full. Carries the inactive sessions an administrator
    /// could revoke, or the active ones when no slot is revocable.
    Exhausted {
        inactive: Vec<Session>,
        active: Vec<Session>,
    },
}

/// Result of a `try_use_statement` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    Granted { used: i64, remaining: i64 },
    LimitReached { used: i64, remaining: i64 },
    /// No usable license record; fail closed.
    Unlicensed,
}

struct PoolInner {
    sessions: HashMap<String, Session>,
    used_statements: i64,
    last_flush: Instant,
}

/// Concurrent, capacity-enforcing owner of all license sessions.
///
/// All operations take a single exclusive lock over the session map;
/// `active_count` reads an atomic maintained alongside it.
pub struct SessionPool {
    store: std::sync::Arc<LicenseStore>,
    flush_interval: Duration,
    inner: Mutex<PoolInner>,
    active_count: AtomicUsize,
}

impl SessionPool {
    /// Build a pool over the given store. The statement counter starts from
    /// whatever the sealed record last recorded.
    pub fn new(store: std::sync::Arc<LicenseStore>, flush_interval: Duration) -> Self {
        let used = store.record().used_statements;
        Self {
            store,
            flush_interval,
            inner: Mutex::new(PoolInner {
                sessions: HashMap::new(),
                used_statements: used,
                last_flush: Instant::now(),
            }),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Re-read the statement counter from the store record, e.g. after
    /// activation installed a fresh record.
    pub fn reset_quota_from_record(&self) {
        let used = self.store.record().used_statements;
        let mut inner = self.inner.lock().unwrap();
        inner.used_statements = used;
        debug!(used, "statement counter reset from record");
    }

    /// Claim a slot for a (device, client) pair, or report why it cannot be
    /// claimed. Concurrent calls with the same key resolve to one session.
    pub fn try_use(
        &self,
        client_id: &str,
        uuid: &str,
        mac_address: &str,
        hostname: &str,
        username: &str,
    ) -> AssignOutcome {
        let key = session_key(uuid, hostname, client_id);
        let max_users = self.store.record().number_of_users.max(0) as usize;

        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.sessions.get(&key) {
            debug!(session = %short(&key), "session already assigned");
            return AssignOutcome::AlreadyAssigned(existing.clone());
        }

        if inner.sessions.len() >= max_users {
            let inactive: Vec<Session> = inner
                .sessions
                .values()
                .filter(|s| !s.active)
                .cloned()
                .collect();
            let active: Vec<Session> = if inactive.is_empty() {
                inner.sessions.values().cloned().collect()
            } else {
                Vec::new()
            };
            info!(
                capacity = max_users,
                "license pool exhausted, rejecting assignment"
            );
            return AssignOutcome::Exhausted { inactive, active };
        }

        let now = Utc::now();
        let session = Session {
            session_key: key.clone(),
            client_id: client_id.trim().to_string(),
            uuid: uuid.trim().to_string(),
            mac_address: mac_address.trim().to_string(),
            hostname: hostname.trim().to_string(),
            username: username.trim().to_string(),
            assigned_at: now,
            last_heartbeat: Some(now),
            active: false,
        };
        inner.sessions.insert(key.clone(), session.clone());
        info!(session = %short(&key), hostname = %session.hostname, "session assigned");
        AssignOutcome::Assigned(session)
    }

    /// Flip a session active and touch its heartbeat.
    pub fn activate(
        &self,
        client_id: &str,
        uuid: &str,
        _mac_address: &str,
        hostname: &str,
    ) -> Result<Session> {
        let key = session_key(uuid, hostname, client_id);
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(&key)
            .ok_or_else(|| Error::SessionNotFound(key.clone()))?;
        if !session.active {
            self.active_count.fetch_add(1, Ordering::Relaxed);
        }
        session.active = true;
        session.last_heartbeat = Some(Utc::now());
        debug!(session = %short(&key), "session activated");
        Ok(session.clone())
    }

    /// Flip a session inactive. The slot stays occupied.
    pub fn deactivate(
        &self,
        client_id: &str,
        uuid: &str,
        _mac_address: &str,
        hostname: &str,
    ) -> Result<Session> {
        let key = session_key(uuid, hostname, client_id);
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(&key)
            .ok_or_else(|| Error::SessionNotFound(key.clone()))?;
        if session.active {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
        session.active = false;
        debug!(session = %short(&key), "session deactivated");
        Ok(session.clone())
    }

    /// Remove a session unconditionally.
    pub fn release(
        &self,
        client_id: &str,
        uuid: &str,
        _mac_address: &str,
        hostname: &str,
    ) -> Result<Session> {
        let key = session_key(uuid, hostname, client_id);
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .remove(&key)
            .ok_or_else(|| Error::SessionNotFound(key.clone()))?;
        if session.active {
            self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
        info!(session = %short(&key), "session released");
        Ok(session)
    }

    /// Remove a session by key, only if it is inactive. Active sessions must
    /// be deactivated or released by their owner first.
    pub fn revoke(&self, key: &str) -> Result<Session> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get(key)
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))?;
        if session.active {
            return Err(Error::ActiveSession);
        }
        let session = inner.sessions.remove(key).expect("checked above");
        info!(session = %short(key), "session revoked");
        Ok(session)
    }

    /// Membership test by session key.
    pub fn is_valid(
        &self,
        client_id: &str,
        uuid: &str,
        _mac_address: &str,
        hostname: &str,
    ) -> bool {
        let key = session_key(uuid, hostname, client_id);
        self.inner.lock().unwrap().sessions.contains_key(&key)
    }

    /// Read-only snapshot of all sessions, oldest first. This is the only
    /// way the dashboard sees the table.
    pub fn sessions(&self) -> Vec<Session> {
        let inner = self.inner.lock().unwrap();
        let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.assigned_at);
        sessions
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of active sessions.
    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Consume one statement from the quota, flushing the counter to the
    /// sealed artifact when the flush interval has elapsed.
    pub fn try_use_statement(&self) -> QuotaOutcome {
        let record = self.store.record();
        if !self.store.is_valid() {
            return QuotaOutcome::Unlicensed;
        }

        let mut inner = self.inner.lock().unwrap();
        if record.number_of_statements == UNLIMITED_STATEMENTS {
            return QuotaOutcome::Granted {
                used: inner.used_statements,
                remaining: i64::MAX,
            };
        }

        let limit = record.number_of_statements;
        if inner.used_statements >= limit {
            return QuotaOutcome::LimitReached {
                used: inner.used_statements,
                remaining: 0,
            };
        }

        inner.used_statements += 1;
        let outcome = QuotaOutcome::Granted {
            used: inner.used_statements,
            remaining: (limit - inner.used_statements).max(0),
        };

        if inner.last_flush.elapsed() >= self.flush_interval {
            Self::flush_locked(&self.store, &mut inner);
        }
        outcome
    }

    /// Whether the quota is exhausted. Fails closed when no usable record is
    /// loaded.
    pub fn is_statement_limit_reached(&self) -> bool {
        let record = self.store.record();
        if !self.store.is_valid() {
            return true;
        }
        if record.number_of_statements == UNLIMITED_STATEMENTS {
            return false;
        }
        self.inner.lock().unwrap().used_statements >= record.number_of_statements
    }

    /// Statements left, `i64::MAX` for unlimited, zero when no record.
    pub fn remaining_statements(&self) -> i64 {
        let record = self.store.record();
        if !self.store.is_valid() {
            return 0;
        }
        if record.number_of_statements == UNLIMITED_STATEMENTS {
            return i64::MAX;
        }
        let used = self.inner.lock().unwrap().used_statements;
        (record.number_of_statements - used).max(0)
    }

    /// Statements consumed so far this license.
    pub fn used_statements(&self) -> i64 {
        self.inner.lock().unwrap().used_statements
    }

    /// Write the statement counter through to the sealed artifact. Called
    /// periodically from `try_use_statement` and once at shutdown.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let used = inner.used_statements;
        self.store.set_used_statements(used)?;
        inner.last_flush = Instant::now();
        Ok(())
    }

    fn flush_locked(store: &LicenseStore, inner: &mut PoolInner) {
        match store.set_used_statements(inner.used_statements) {
            Ok(()) => inner.last_flush = Instant::now(),
            // Next granted statement past the interval retries.
            Err(e) => warn!(error = %e, "statement flush failed"),
        }
    }
}

fn short(key: &str) -> &str {
    &key[..key.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use warden_core::LicenseRecord;
    use warden_core::clock;

    const FP: &str = "pool-test-host|tester|uid:1000|uuid";

    fn store_with(dir: &TempDir, users: i64, statements: i64) -> Arc<LicenseStore> {
        let store = Arc::new(LicenseStore::new(dir.path().join("license.enc"), FP));
        store
            .replace(LicenseRecord {
                license_key: "WARDEN-POOL-TEST".to_string(),
                current_timestamp: clock::wall_secs(),
                expiry_timestamp: clock::wall_secs() + 86_400,
                number_of_users: users,
                number_of_statements: statements,
                role: "standard".to_string(),
                used_statements: 0,
                system_up_time: 0,
            })
            .unwrap();
        store
    }

    fn pool_with(dir: &TempDir, users: i64, statements: i64) -> SessionPool {
        SessionPool::new(store_with(dir, users, statements), Duration::from_secs(10))
    }

    #[test]
    fn test_assign_activate_deactivate_revoke_lifecycle() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 2, 100);

        let session = match pool.try_use("c1", "u1", "m1", "h1", "alice") {
            AssignOutcome::Assigned(s) => s,
            other => panic!("expected assignment, got {other:?}"),
        };
        assert!(!session.active);
        assert_eq!(pool.len(), 1);

        pool.activate("c1", "u1", "m1", "h1").unwrap();
        assert_eq!(pool.active_count(), 1);

        pool.deactivate("c1", "u1", "m1", "h1").unwrap();
        assert_eq!(pool.active_count(), 0);

        pool.revoke(&session.session_key).unwrap();
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_duplicate_assignment_returns_same_session() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 1, 100);

        let first = match pool.try_use("c1", "u1", "m1", "h1", "alice") {
            AssignOutcome::Assigned(s) => s,
            other => panic!("unexpected {other:?}"),
        };
        // MAC and username differ, key does not.
        let second = match pool.try_use("c1", "u1", "other-mac", "h1", "bob") {
            AssignOutcome::AlreadyAssigned(s) => s,
            other => panic!("expected already-assigned, got {other:?}"),
        };
        assert_eq!(first.session_key, second.session_key);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_capacity_exhaustion_reports_inactive_then_active() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 1, 100);

        let first = match pool.try_use("c1", "u1", "m1", "h1", "a") {
            AssignOutcome::Assigned(s) => s,
            other => panic!("unexpected {other:?}"),
        };

        match pool.try_use("c2", "u2", "m2", "h2", "b") {
            AssignOutcome::Exhausted { inactive, active } => {
                assert_eq!(inactive.len(), 1);
                assert_eq!(inactive[0].session_key, first.session_key);
                assert!(active.is_empty());
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }

        pool.activate("c1", "u1", "m1", "h1").unwrap();
        match pool.try_use("c2", "u2", "m2", "h2", "b") {
            AssignOutcome::Exhausted { inactive, active } => {
                assert!(inactive.is_empty());
                assert_eq!(active.len(), 1);
                assert_eq!(active[0].session_key, first.session_key);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_pool_never_exceeds_capacity() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 3, 100);
        for i in 0..10 {
            pool.try_use(&format!("c{i}"), &format!("u{i}"), "m", &format!("h{i}"), "u");
            assert!(pool.len() <= 3);
        }
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_release_then_reassign_gets_fresh_timestamp() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 1, 100);

        let first = match pool.try_use("c1", "u1", "m1", "h1", "a") {
            AssignOutcome::Assigned(s) => s,
            other => panic!("unexpected {other:?}"),
        };
        pool.release("c1", "u1", "m1", "h1").unwrap();
        assert_eq!(pool.len(), 0);

        let second = match pool.try_use("c1", "u1", "m1", "h1", "a") {
            AssignOutcome::Assigned(s) => s,
            other => panic!("unexpected {other:?}"),
        };
        assert!(second.assigned_at >= first.assigned_at);
    }

    #[test]
    fn test_revoke_refuses_active_sessions() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 1, 100);

        let session = match pool.try_use("c1", "u1", "m1", "h1", "a") {
            AssignOutcome::Assigned(s) => s,
            other => panic!("unexpected {other:?}"),
        };
        pool.activate("c1", "u1", "m1", "h1").unwrap();

        assert!(matches!(
            pool.revoke(&session.session_key),
            Err(Error::ActiveSession)
        ));
        assert_eq!(pool.len(), 1);

        pool.deactivate("c1", "u1", "m1", "h1").unwrap();
        pool.revoke(&session.session_key).unwrap();
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_unknown_keys_report_not_found() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 1, 100);

        assert!(matches!(
            pool.activate("nope", "nope", "m", "h"),
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(
            pool.release("nope", "nope", "m", "h"),
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(
            pool.revoke("deadbeef"),
            Err(Error::SessionNotFound(_))
        ));
        assert!(!pool.is_valid("nope", "nope", "m", "h"));
    }

    #[test]
    fn test_statement_quota_counts_down() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 1, 3);

        for expected_used in 1..=3 {
            match pool.try_use_statement() {
                QuotaOutcome::Granted { used, remaining } => {
                    assert_eq!(used, expected_used);
                    assert_eq!(remaining, 3 - expected_used);
                }
                other => panic!("expected grant, got {other:?}"),
            }
        }
        assert!(matches!(
            pool.try_use_statement(),
            QuotaOutcome::LimitReached { used: 3, .. }
        ));
        assert!(pool.is_statement_limit_reached());
        assert_eq!(pool.remaining_statements(), 0);
    }

    #[test]
    fn test_unlimited_statements_never_increment() {
        let dir = TempDir::new().unwrap();
        let pool = pool_with(&dir, 1, UNLIMITED_STATEMENTS);

        for _ in 0..1000 {
            match pool.try_use_statement() {
                QuotaOutcome::Granted { used, remaining } => {
                    assert_eq!(used, 0);
                    assert_eq!(remaining, i64::MAX);
                }
                other => panic!("expected grant, got {other:?}"),
            }
        }
        assert_eq!(pool.used_statements(), 0);
        assert_eq!(pool.remaining_statements(), i64::MAX);
        assert!(!pool.is_statement_limit_reached());
    }

    #[test]
    fn test_quota_fails_closed_without_license() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LicenseStore::new(dir.path().join("license.enc"), FP));
        let pool = SessionPool::new(store, Duration::from_secs(10));

        assert_eq!(pool.try_use_statement(), QuotaOutcome::Unlicensed);
        assert!(pool.is_statement_limit_reached());
        assert_eq!(pool.remaining_statements(), 0);
    }

    #[test]
    fn test_flush_persists_counter() {
        let dir = TempDir::new().unwrap();
        // Zero interval: every granted statement flushes.
        let store = store_with(&dir, 1, 10);
        let pool = SessionPool::new(store.clone(), Duration::ZERO);

        pool.try_use_statement();
        pool.try_use_statement();

        let reopened = LicenseStore::new(dir.path().join("license.enc"), FP);
        reopened.load().unwrap();
        assert!(reopened.record().used_statements >= 2);
    }

    #[test]
    fn test_flush_interval_defers_persistence() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, 1, 10);
        let pool = SessionPool::new(store.clone(), Duration::from_secs(3600));

        pool.try_use_statement();
        // In-memory moved, disk did not.
        assert_eq!(pool.used_statements(), 1);
        let reopened = LicenseStore::new(dir.path().join("license.enc"), FP);
        reopened.load().unwrap();
        assert_eq!(reopened.record().used_statements, 0);

        // Explicit flush (the shutdown path) writes through.
        pool.flush().unwrap();
        let reopened = LicenseStore::new(dir.path().join("license.enc"), FP);
        reopened.load().unwrap();
        assert_eq!(reopened.record().used_statements, 1);
    }

    #[test]
    fn test_concurrent_assignment_same_key_is_single_slot() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(pool_with(&dir, 5, 100));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || pool.try_use("c1", "u1", "m1", "h1", "alice"))
            })
            .collect();

        let mut assigned = 0;
        for handle in handles {
            match handle.join().unwrap() {
                AssignOutcome::Assigned(_) => assigned += 1,
                AssignOutcome::AlreadyAssigned(_) => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(assigned, 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_counter_starts_from_record() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, 1, 10);
        store.set_used_statements(4).unwrap();

        let pool = SessionPool::new(store, Duration::from_secs(10));
        assert_eq!(pool.used_statements(), 4);
        assert_eq!(pool.remaining_statements(), 6);
    }
}
