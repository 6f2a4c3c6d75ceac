//! Key-value store boundary and the in-memory implementation.
//!
//! The cache wrapper only ever talks to [`CacheStore`]: get a raw value,
//! set a raw value with an expiration. Values are UTF-8 JSON documents.
//! A store is expected to own expiration itself — the wrapper performs no
//! staleness re-check on hits. A backend without native per-key TTL must
//! enforce expiry inside its `CacheStore` impl, as [`MemoryStore`] does.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Process-wide key-value store with per-key expiration.
///
/// Constructed once at startup and handed to request-scoped operations as
/// `Arc<dyn CacheStore>`; nothing in the request path reaches for a global.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `value` under `key`, expiring after `expire`. Last write wins.
    async fn set(&self, key: &str, value: Vec<u8>, expire: Duration);
}

struct Entry {
    value: Vec<u8>,
    deadline: Instant,
}

/// In-memory [`CacheStore`] with lazy per-entry expiry.
///
/// Expired entries are dropped when their key is read again, and every write
/// sweeps out already-expired entries so one-off keys cannot accumulate in a
/// long-lived process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries. Test and introspection helper.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|e| e.deadline > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.get(key) {
            Some(entry) if entry.deadline > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, expire: Duration) {
        let now = Instant::now();
        let entry = Entry {
            value,
            deadline: now + expire,
        };
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Writes double as the sweep point for entries nothing reads again.
        entries.retain(|_, e| e.deadline > now);
        entries.insert(key.to_owned(), entry);
    }
}
