// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-global gating of upstream requests.
//!
//! Two independent gates: a per-minute throughput quota and an in-flight
//! concurrency cap. Acquisition order is throughput first, then
//! concurrency; the permit guard releases in reverse on drop.

use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use tokio::sync::{Semaphore, SemaphorePermit};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[allow(missing_debug_implementations)]
pub struct RequestGate {
    limiter: DirectRateLimiter,
    semaphore: Semaphore,
}

impl RequestGate {
    #[must_use]
    pub fn new(requests_per_minute: u32, max_concurrent: usize) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(requests_per_minute.max(1)).expect("clamped to non-zero"),
        );
        Self {
            limiter: RateLimiter::direct(quota),
            semaphore: Semaphore::new(max_concurrent),
        }
    }

    /// Wait for both gates. The returned permit holds the concurrency
    /// slot until dropped.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.limiter.until_ready().await;
        self.semaphore
            .acquire()
            .await
            .expect("semaphore is never closed")
    }

    #[must_use]
    pub fn available_concurrency(&self) -> usize {
        self.semaphore.available_permits()
    }
}
