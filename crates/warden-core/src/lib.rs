//! Warden Core
//!
//! Core domain types, error handling, and configuration for the Warden
//! license appliance. This crate has minimal dependencies and defines the
//! shared vocabulary used across all other crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod license;

pub use error::{Error, Result};
pub use license::{LicenseRecord, UNLIMITED_STATEMENTS};
