//! Warden Pool
//!
//! The license state manager: a capped, concurrent pool of per-client
//! sessions plus the process-wide statement quota with periodic durable
//! flush through the vault store.

mod pool;
mod session;

pub use pool::{AssignOutcome, QuotaOutcome, SessionPool};
pub use session::{Session, session_key};
