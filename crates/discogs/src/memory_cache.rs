// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! TTL-bounded, size-bounded keyed caches.
//!
//! Entries expire after their TTL and the least recently inserted entry
//! is evicted at capacity. Negative results are the caller's concern:
//! nothing stops a `None` from being skipped, and the service tiers
//! never insert one. All reads and writes honor the per-request
//! `skip_cache` flag.

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use euterpe_core::{matching::normalize, stats::RequestContext};

/// Stable cache key over an operation name and its canonicalized
/// arguments.
#[must_use]
pub fn cache_key(operation: &str, args: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    for arg in args {
        hasher.update([0u8]);
        hasher.update(normalize(arg).as_bytes());
    }
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    insertion_order: VecDeque<String>,
}

/// A keyed cache with TTL expiry and least-recently-inserted eviction.
///
/// The lock is never held across a suspension point; `get` clones the
/// value out.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    /// Look up a key, recording a memory hit in the request counters.
    pub fn get(&self, key: &str, ctx: &RequestContext) -> Option<V> {
        if ctx.skip_cache {
            return None;
        }
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                let value = entry.value.clone();
                ctx.stats.record_memory_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
            inner.insertion_order.retain(|k| k != key);
        }
        None
    }

    pub fn insert(&self, key: String, value: V, ctx: &RequestContext) {
        if ctx.skip_cache || self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.entries.remove(&key).is_some() {
            inner.insertion_order.retain(|k| k != &key);
        }
        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.insertion_order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
        inner.insertion_order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.insertion_order.clear();
    }
}
