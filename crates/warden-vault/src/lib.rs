//! Warden Vault
//!
//! The machine-bound license vault: a per-host fingerprint, a symmetric
//! codec keyed off that fingerprint, and the store that owns the sealed
//! license artifact on disk.
//!
//! The artifact format is fixed for backward compatibility: PBKDF2-derived
//! AES-256-CBC ciphertext of a JSON record, no framing, no MAC. Any
//! decryption failure is treated as corruption or a cross-machine move and
//! is not retriable.

mod codec;
mod fingerprint;
mod store;

pub use codec::{open, seal};
pub use fingerprint::machine_fingerprint;
pub use store::LicenseStore;
