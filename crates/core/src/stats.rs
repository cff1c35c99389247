// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-request cache and API accounting.
//!
//! One [`RequestContext`] is created per inbound request and passed
//! explicitly through every cache tier and HTTP call. Counters are
//! atomics so the bounded fan-out steps can record from concurrent
//! tasks without locking.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonically non-decreasing counters for a single request.
#[derive(Debug, Default)]
pub struct RequestStats {
    memory_hits: AtomicU32,
    pg_hits: AtomicU32,
    pg_misses: AtomicU32,
    api_calls: AtomicU32,
    pg_time_us: AtomicU64,
    api_time_us: AtomicU64,
}

impl RequestStats {
    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pg_hit(&self) {
        self.pg_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pg_miss(&self) {
        self.pg_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pg_time(&self, elapsed: std::time::Duration) {
        self.pg_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_api_time(&self, elapsed: std::time::Duration) {
        self.api_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            pg_hits: self.pg_hits.load(Ordering::Relaxed),
            pg_misses: self.pg_misses.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
            pg_time_ms: self.pg_time_us.load(Ordering::Relaxed) as f64 / 1_000.0,
            api_time_ms: self.api_time_us.load(Ordering::Relaxed) as f64 / 1_000.0,
        }
    }
}

/// Snapshot of [`RequestStats`], attached to lookup responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_hits: u32,
    pub pg_hits: u32,
    pub pg_misses: u32,
    pub api_calls: u32,
    pub pg_time_ms: f64,
    pub api_time_ms: f64,
}

/// Request-scoped context threaded through all cache tiers.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub stats: RequestStats,
    /// Bypass all cache reads and writes for this request.
    pub skip_cache: bool,
}

impl RequestContext {
    #[must_use]
    pub fn new(skip_cache: bool) -> Self {
        Self {
            stats: RequestStats::default(),
            skip_cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = RequestStats::default();
        stats.record_memory_hit();
        stats.record_memory_hit();
        stats.record_pg_hit();
        stats.record_pg_miss();
        stats.record_api_call();
        stats.record_pg_time(std::time::Duration::from_millis(3));
        stats.record_api_time(std::time::Duration::from_millis(250));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.memory_hits, 2);
        assert_eq!(snapshot.pg_hits, 1);
        assert_eq!(snapshot.pg_misses, 1);
        assert_eq!(snapshot.api_calls, 1);
        assert!((snapshot.pg_time_ms - 3.0).abs() < 0.001);
        assert!((snapshot.api_time_ms - 250.0).abs() < 0.001);
    }

    #[test]
    fn fresh_context_is_zeroed() {
        let ctx = RequestContext::new(true);
        assert!(ctx.skip_cache);
        assert_eq!(ctx.stats.snapshot(), CacheStats::default());
    }
}
