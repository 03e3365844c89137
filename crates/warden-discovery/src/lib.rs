//! Warden Discovery
//!
//! Dual-transport zero-configuration discovery: mDNS service-record
//! advertisement with periodic re-announcement, and a UDP query/response
//! responder on a well-known port. Clients can use either to find the
//! appliance without static configuration.

mod announcer;
mod net;
mod responder;

pub use announcer::{
    DATABASE_SERVICE_TYPE, LICENSE_SERVICE_TYPE, MIN_REANNOUNCE_INTERVAL, MdnsAnnouncer,
    ServiceProfile,
};
pub use net::primary_ipv4;
pub use responder::{DATABASE_QUERY, DiscoveryResponder, LICENSE_QUERY};
