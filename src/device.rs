//! Stable device identity.
//!
//! The active-task handle and the publisher ownership gate both need to know
//! "which machine is this", stable across restarts. The ID is a SHA-256 over
//! host-identifying attributes; if nothing about the host can be read at all,
//! a random UUID is used instead.

use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

/// Stable hex ID for this machine.
pub fn device_id() -> String {
    let hostname = hostname();
    let mac = primary_mac();

    if hostname.is_none() && mac.is_none() {
        warn!("no host attributes available; using a random device id");
        return Uuid::new_v4().simple().to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(hostname.as_deref().unwrap_or(""));
    hasher.update(b"|");
    hasher.update(std::env::consts::ARCH);
    hasher.update(b"|");
    hasher.update(whoami::arch().to_string());
    hasher.update(b"|");
    hasher.update(mac.unwrap_or(0).to_be_bytes());
    hasher.update(b"|");
    hasher.update(std::env::consts::OS);

    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Short human-readable label for this machine, used in published state.
pub fn device_label() -> String {
    hostname().unwrap_or_else(|| format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH))
}

fn hostname() -> Option<String> {
    whoami::fallible::hostname().ok().and_then(|name| {
        let trimmed = name.trim().to_string();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    })
}

/// Primary MAC address packed into the low 48 bits of a u64.
fn primary_mac() -> Option<u64> {
    let mac = mac_address::get_mac_address().ok().flatten()?;
    let bytes = mac.bytes();
    let mut value: u64 = 0;
    for byte in bytes {
        value = (value << 8) | u64::from(byte);
    }
    Some(value)
}
