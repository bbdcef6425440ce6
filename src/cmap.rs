//! Sharded concurrent map keyed by strings.
//!
//! [`CMap`] backs the scheduler's seen-URL and accepted-domain sets. The
//! `concurrency` construction parameter selects how many shards guard the
//! storage; keys are spread across shards by hash, so there is no
//! iteration-consistency guarantee across shards.

use dashmap::DashMap;

use crate::error::{Error, Result};

/// Upper bound on the requested concurrency level.
pub const MAX_CONCURRENCY: usize = 65536;

/// A string-keyed concurrent map with a configurable shard count.
pub struct CMap<V = ()> {
    inner: DashMap<String, V>,
    concurrency: usize,
}

impl<V: Send + Sync + 'static> CMap<V> {
    /// Creates a map with `concurrency` in `[1, MAX_CONCURRENCY]`. The
    /// shard count is the next power of two (at least 2) covering the
    /// requested level.
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(Error::illegal_parameter(format!(
                "concurrency is invalid: {concurrency}"
            )));
        }
        let shards = concurrency.next_power_of_two().max(2);
        Ok(CMap {
            inner: DashMap::with_shard_amount(shards),
            concurrency,
        })
    }

    /// The concurrency level requested at construction.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Inserts a key, returning the previous value if the key was already
    /// present. The return value is the atomic commit point callers rely
    /// on for first-writer-wins semantics.
    pub fn put(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.inner.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Snapshot of the current keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|e| e.key().clone()).collect()
    }
}

impl<V: Clone + Send + Sync + 'static> CMap<V> {
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).map(|e| e.value().clone())
    }
}
