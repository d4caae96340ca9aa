//!
//! sce storage boundary
//! --------------------
//! The access core persists everything through a plain string key-value capability,
//! the same shape a browser's local storage offers. This module defines that
//! capability (`KeyValueStore`), two backends (`MemoryStore`, `FileStore`) and the
//! typed JSON helpers every component reads through.
//!
//! Key responsibilities:
//! - Parse stored strings into strict serde types at the boundary.
//! - Move malformed payloads into the quarantine key instead of trusting or silently
//!   dropping them, then carry on as if the data were absent.
//! - Never let a corrupt or unavailable store crash a caller on the read path.

use std::sync::Arc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuthError, AuthResult};

pub mod keys;
pub mod kv;

pub use keys::StorageKeys;
pub use kv::{FileStore, MemoryStore};

/// String key-value persistence. Implementations must make a completed `set`
/// visible to the next `get` on the same instance.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
    /// Returns true if the key existed.
    fn remove(&self, key: &str) -> anyhow::Result<bool>;
    fn keys(&self) -> Vec<String>;
}

pub type SharedKv = Arc<dyn KeyValueStore>;

/// One rejected payload kept for inspection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuarantineEntry {
    /// Key the payload was read from.
    pub source: String,
    pub raw: String,
    pub reason: String,
    pub quarantined_at: chrono::DateTime<chrono::Utc>,
}

/// Read and parse one JSON value. Distinguishes absent, corrupt and unavailable.
pub fn load_json<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> AuthResult<Option<T>> {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ok(None),
        Err(e) => return Err(AuthError::Storage(format!("read '{}': {}", key, e))),
    };
    serde_json::from_str::<T>(&raw)
        .map(Some)
        .map_err(|e| AuthError::PersistenceCorrupt { key: key.to_string(), detail: e.to_string() })
}

pub fn store_json<T: Serialize + ?Sized>(kv: &dyn KeyValueStore, key: &str, value: &T) -> AuthResult<()> {
    let raw = serde_json::to_string(value)?;
    kv.set(key, raw).map_err(|e| AuthError::Storage(format!("write '{}': {}", key, e)))
}

pub fn remove_key(kv: &dyn KeyValueStore, key: &str) -> AuthResult<bool> {
    kv.remove(key).map_err(|e| AuthError::Storage(format!("remove '{}': {}", key, e)))
}

/// Read a single JSON value, treating every failure as absent.
/// A corrupt payload is quarantined and its key removed.
pub fn load_json_or_quarantine<T: DeserializeOwned>(kv: &dyn KeyValueStore, keys: &StorageKeys, key: &str) -> Option<T> {
    match load_json::<T>(kv, key) {
        Ok(v) => v,
        Err(AuthError::PersistenceCorrupt { detail, .. }) => {
            warn!(target: "sce::storage", "corrupt entry '{}': {}; quarantining", key, detail);
            if let Ok(Some(raw)) = kv.get(key) {
                quarantine(kv, keys, key, raw, &detail);
            }
            if let Err(e) = kv.remove(key) {
                warn!(target: "sce::storage", "could not remove corrupt entry '{}': {}", key, e);
            }
            None
        }
        Err(e) => {
            warn!(target: "sce::storage", "{}; treating '{}' as absent", e, key);
            None
        }
    }
}

/// Read a JSON array of records, parsing each element on its own.
/// Malformed elements are quarantined and the collection rewritten without them;
/// a payload that is not an array at all is quarantined whole.
pub fn load_records<T>(kv: &dyn KeyValueStore, keys: &StorageKeys, key: &str) -> Vec<T>
where
    T: DeserializeOwned + Serialize,
{
    let Some(items) = load_json_or_quarantine::<Vec<serde_json::Value>>(kv, keys, key) else {
        return Vec::new();
    };
    let mut good: Vec<T> = Vec::with_capacity(items.len());
    let mut rejected = 0usize;
    for item in items {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(rec) => good.push(rec),
            Err(e) => {
                rejected += 1;
                quarantine(kv, keys, key, item.to_string(), &e.to_string());
            }
        }
    }
    if rejected > 0 {
        warn!(target: "sce::storage", "'{}': quarantined {} malformed record(s), kept {}", key, rejected, good.len());
        if let Err(e) = store_json(kv, key, &good) {
            warn!(target: "sce::storage", "could not rewrite '{}' after quarantine: {}", key, e);
        }
    }
    good
}

fn quarantine(kv: &dyn KeyValueStore, keys: &StorageKeys, source: &str, raw: String, reason: &str) {
    // A corrupt quarantine list is replaced rather than recursed into.
    let mut list: Vec<QuarantineEntry> = load_json(kv, &keys.quarantine).ok().flatten().unwrap_or_default();
    list.push(QuarantineEntry {
        source: source.to_string(),
        raw,
        reason: reason.to_string(),
        quarantined_at: chrono::Utc::now(),
    });
    if let Err(e) = store_json(kv, &keys.quarantine, &list) {
        warn!(target: "sce::storage", "could not write quarantine entry for '{}': {}", source, e);
    }
}

/// All quarantined payloads, oldest first.
pub fn quarantined(kv: &dyn KeyValueStore, keys: &StorageKeys) -> Vec<QuarantineEntry> {
    load_json(kv, &keys.quarantine).ok().flatten().unwrap_or_default()
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
