//! Best-effort JSON preference cache on top of `localStorage`.
//!
//! Every call degrades silently (with a warning) when storage is disabled,
//! full, or holds something that no longer deserializes.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::host::Host;

/// Prefix applied to every key this crate writes.
pub const KEY_PREFIX: &str = "folio:";

fn key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

/// Store `value` as JSON. Returns whether it was written.
pub fn store<H: Host, T: Serialize + ?Sized>(
    host: &H,
    name: &str,
    value: &T,
) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Failed to encode '{name}' for storage: {e}");
            return false;
        }
    };
    match host.storage_set(&key(name), &json) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to save '{name}' to storage: {e}");
            false
        }
    }
}

/// Load a JSON value, falling back to `None` on any failure.
pub fn load<H: Host, T: DeserializeOwned>(host: &H, name: &str) -> Option<T> {
    let raw = match host.storage_get(&key(name)) {
        Ok(raw) => raw?,
        Err(e) => {
            log::warn!("Failed to read '{name}' from storage: {e}");
            return None;
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| log::warn!("Discarding stored '{name}': {e}"))
        .ok()
}

/// Remove a stored value. Returns whether the removal succeeded.
pub fn forget<H: Host>(host: &H, name: &str) -> bool {
    host.storage_remove(&key(name))
        .map_err(|e| log::warn!("Failed to remove '{name}' from storage: {e}"))
        .is_ok()
}
