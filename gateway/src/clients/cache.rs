//! TTL cache for collaborator responses
//!
//! Process-wide, clock-injected. Callers decide the policy: serve fresh
//! values directly, and fall back to the last good value (however stale)
//! when the upstream errors.

use card_ledger::Clock;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Keyed TTL cache over cloneable values
pub struct TtlCache<K, V> {
    entries: DashMap<K, (V, DateTime<Utc>)>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Create a cache with `ttl_secs` freshness
    pub fn new(ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
            clock,
        }
    }

    /// The cached value if it is within the TTL
    pub fn fresh(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|entry| {
            let (value, stored_at) = entry.value();
            if self.clock.now() - *stored_at < self.ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    /// The cached value regardless of age (the stale-fallback path)
    pub fn any(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().0.clone())
    }

    /// Store a freshly fetched value
    pub fn put(&self, key: K, value: V) {
        self.entries.insert(key, (value, self.clock.now()));
    }
}
