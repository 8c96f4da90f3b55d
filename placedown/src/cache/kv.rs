//! Key-value coordination store abstraction.
//!
//! All cross-process coordination (build locks, task ids, throttle
//! bookkeeping) goes through the [`KvStore`] trait. The only semantics the
//! rest of the crate relies on are atomic set-if-absent and per-key expiry;
//! any store providing those (Redis, memcached, ...) can back it.
//!
//! [`MemoryKvStore`] is the in-process implementation used by tests and
//! single-node deployments.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Minimal key-value store contract for distributed coordination.
///
/// Implementations must provide atomic set-if-absent and per-key expiry.
/// No stronger consistency is assumed; eventual visibility across nodes is
/// acceptable as long as `set_nx` itself is atomic.
pub trait KvStore: Send + Sync + 'static {
    /// Atomically sets `key` to `value` with `ttl` only if absent.
    ///
    /// Returns true iff the value was set by this call.
    fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> bool;

    /// Sets `key` to `value` with `ttl`, overwriting any existing value.
    fn set(&self, key: &str, value: &str, ttl: Duration);

    /// Returns the value of `key` if present and not expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Removes `key`. Idempotent.
    fn delete(&self, key: &str);

    /// Returns true iff `key` is present and not expired.
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory [`KvStore`] with lazy expiry.
///
/// Backed by a `DashMap` so concurrent callers on different tasks or
/// threads see the same atomicity guarantees a networked store would give.
/// Expired entries are dropped on access rather than by a sweeper.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryKvStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries. Test and diagnostics helper.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.value().expired()).count()
    }

    /// Returns true if the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKvStore {
    fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> bool {
        // The entry API holds the shard lock, making check-then-set atomic.
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().expired() {
                    occupied.insert(StoredValue {
                        value: value.to_string(),
                        expires_at: Instant::now() + ttl,
                    });
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(StoredValue {
                    value: value.to_string(),
                    expires_at: Instant::now() + ttl,
                });
                true
            }
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.value().expired() {
                    true
                } else {
                    return Some(entry.value().value.clone());
                }
            }
            None => return None,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}
