//! Warden Issuer
//!
//! Client for the remote upstream validator that issues license records.
//! The admission middleware only ever sees the narrow [`UpstreamGuard`]
//! capability; how the two calls are carried out is this crate's business.

mod client;

pub use client::{DeviceInfo, IssuerClient, IssuerConfig, TamperReport, UpstreamGuard};
