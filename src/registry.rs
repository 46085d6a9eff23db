//! Concurrent session registry
//!
//! A `HashMap` behind a reader/writer lock. The lock is synchronous and every
//! method returns before giving control back to the runtime, so it can never
//! be held across a socket write or a queue operation.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

/// Thread-safe index of sessions by key
///
/// Values are normally `Arc`s; `get` hands out a clone so the caller can
/// work with the session after the lock is released.
#[derive(Debug)]
pub struct Registry<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the value under `key`
    pub fn set(&self, key: K, value: V) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Look up the value under `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Remove the value under `key`, if any
    pub fn delete(&self, key: &K) -> Option<V> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Insert under a freshly generated key that is not already taken
    ///
    /// `next_key` is called until it yields an unused key; `make` then builds
    /// the value for that key. Both run under one exclusive lock, so two
    /// callers can never be handed the same key.
    pub fn insert_fresh<G, F>(&self, mut next_key: G, make: F) -> (K, V)
    where
        G: FnMut() -> K,
        F: FnOnce(&K) -> V,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let key = loop {
            let key = next_key();
            if !entries.contains_key(&key) {
                break key;
            }
        };

        let value = make(&key);
        entries.insert(key.clone(), value.clone());
        (key, value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
