use std::collections::{HashMap, VecDeque};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Hex SHA-256 of raw bytes. Identifies an uploaded file by content.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hex SHA-256 of an operation name followed by its JSON-serialised inputs.
///
/// Inputs that reference a table should include its fingerprint rather than
/// its rows, so keys stay cheap to compute.
pub fn cache_key<T: Serialize + ?Sized>(operation: &str, inputs: &T) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    serde_json::to_writer(&mut hasher, inputs)
        .with_context(|| format!("serialising cache inputs for '{operation}'"))?;
    Ok(format!("{:x}", hasher.finalize()))
}

// ---------------------------------------------------------------------------
// MemoCache
// ---------------------------------------------------------------------------

/// Bounded key/value cache for previously computed results.
///
/// Single-threaded: owned by the session and only touched from the UI thread.
/// Once `capacity` is reached the oldest inserted entry is evicted.
#[derive(Debug)]
pub struct MemoCache<V> {
    entries: HashMap<String, V>,
    order: VecDeque<String>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl<V: Clone> MemoCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(v) => {
                self.hits += 1;
                log::debug!("cache hit {}", &key[..key.len().min(12)]);
                Some(v.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: String, value: V) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    /// Errors from `compute` are returned and nothing is stored.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: String,
        compute: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
