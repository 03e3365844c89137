//! Local network helpers.

use std::net::{IpAddr, Ipv4Addr};

/// Best-effort primary IPv4 address of this host.
///
/// Connecting a UDP socket sends no packets; it only asks the OS which
/// interface would route outbound traffic.
pub fn primary_ipv4() -> Ipv4Addr {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .ok()
        .and_then(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .unwrap_or(Ipv4Addr::LOCALHOST)
}
