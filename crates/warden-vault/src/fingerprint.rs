//! Machine fingerprinting for license binding.
//!
//! The fingerprint combines the machine name, the OS user, and per-OS stable
//! identifiers into a single string. It must be reproducible across restarts
//! of the same host+user and differ when the sealed artifact is copied to
//! another machine. It is only ever used as key-derivation input and is
//! never persisted.

use std::sync::OnceLock;

/// Marker used when a sub-identifier cannot be read. Keeping the marker
/// literal (rather than failing) keeps partial fingerprints reproducible on
/// the same machine.
const UNKNOWN_UUID: &str = "UnknownUUID";
#[cfg(windows)]
const UNKNOWN_SID: &str = "UnknownSID";
const UNKNOWN_USER: &str = "UnknownUser";
const UNKNOWN_HOST: &str = "UnknownHost";

static FINGERPRINT: OnceLock<String> = OnceLock::new();

/// The fingerprint of the current machine and user, computed once per
/// process.
pub fn machine_fingerprint() -> &'static str {
    FINGERPRINT.get_or_init(compute)
}

fn compute() -> String {
    let parts = [machine_name(), user_name(), os_identifiers()];
    let fingerprint = parts.join("|");
    tracing::debug!(len = fingerprint.len(), "computed machine fingerprint");
    fingerprint
}

fn machine_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

fn user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| UNKNOWN_USER.to_string())
}

#[cfg(unix)]
fn os_identifiers() -> String {
    // Numeric uid plus, where present, the machine id.
    let uid = unsafe { libc::getuid() };
    match machine_id() {
        Some(id) => format!("uid:{uid}|{id}"),
        None => format!("uid:{uid}|{UNKNOWN_UUID}"),
    }
}

#[cfg(windows)]
fn os_identifiers() -> String {
    format!("{}|{}", user_sid(), system_uuid())
}

#[cfg(all(unix, target_os = "macos"))]
fn machine_id() -> Option<String> {
    // IOPlatformUUID from the platform expert device.
    std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .and_then(|output| {
            output
                .lines()
                .find(|l| l.contains("IOPlatformUUID"))
                .and_then(|l| l.split('"').nth(3))
                .map(String::from)
        })
}

#[cfg(all(unix, not(target_os = "macos")))]
fn machine_id() -> Option<String> {
    std::fs::read_to_string("/etc/machine-id")
        .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(windows)]
fn system_uuid() -> String {
    // SMBIOS system UUID via WMI.
    std::process::Command::new("wmic")
        .args(["csproduct", "get", "UUID"])
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .and_then(|output| {
            output
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty() && !l.eq_ignore_ascii_case("UUID"))
                .map(String::from)
        })
        .unwrap_or_else(|| UNKNOWN_UUID.to_string())
}

#[cfg(windows)]
fn user_sid() -> String {
    std::process::Command::new("whoami")
        .arg("/user")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .and_then(|output| {
            output
                .split_whitespace()
                .find(|token| token.starts_with("S-1-"))
                .map(String::from)
        })
        .unwrap_or_else(|| UNKNOWN_SID.to_string())
}
