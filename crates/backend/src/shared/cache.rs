use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// In-memory read-through cache for report payloads, keyed by report
/// identity. Constructed explicitly and passed into the orchestrator; there
/// is no process-wide instance.
///
/// Nothing invalidates an entry before its TTL: writes to the underlying
/// collections can leave a cached report stale for up to the TTL window.
/// Concurrent misses may both recompute and both `set`; last write wins.
pub struct ReportCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the stored value, or `None` on miss. An entry whose TTL has
    /// elapsed counts as a miss and is dropped lazily.
    pub fn get(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.is_fresh() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().unwrap();
        match entries.get(key) {
            // A racing `set` may have refreshed the entry between the locks.
            Some(entry) if entry.is_fresh() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new()
    }
}
