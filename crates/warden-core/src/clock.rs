//! Wall-clock and monotonic-clock helpers.
//!
//! The monotonic tick is anchored at the first call within the process, so
//! values are comparable across the process lifetime but not across restarts.
//! That matches how the sealed record's uptime anchor is used: it is re-stamped
//! every time the artifact is loaded or resynced.

use std::sync::OnceLock;
use std::time::Instant;

static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Milliseconds on the process monotonic clock.
pub fn monotonic_ms() -> u64 {
    ANCHOR.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Current wall time as epoch seconds.
pub fn wall_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
