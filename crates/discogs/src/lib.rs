// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The external release metadata subsystem.
//!
//! Three tiers sit in front of the Discogs API: per-request TTL memory
//! caches, an optional shared Postgres cache with a trigram index, and
//! the rate-limited HTTP client itself. [`service::DiscogsService`]
//! composes them and implements the `ReleaseMetadata` seam.

#![deny(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod memory_cache;
pub mod pg_cache;
pub mod ratelimit;
pub mod service;

#[derive(Error, Debug)]
pub enum Error {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {status}")]
    UpstreamStatus { status: reqwest::StatusCode },

    #[error("upstream rate limit exhausted")]
    RateLimited,

    #[error("metadata cache unavailable: {0}")]
    Cache(#[from] sqlx::Error),

    #[error("metadata cache timed out")]
    CacheTimeout,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tunables of the metadata subsystem, populated from the environment by
/// the server binary.
#[derive(Debug, Clone)]
pub struct DiscogsConfig {
    /// Personal access token; required for all upstream requests.
    pub token: String,
    /// Upstream requests per minute, kept below the provider's 60/min.
    pub rate_limit_per_minute: u32,
    /// In-flight upstream requests.
    pub max_concurrent_requests: usize,
    /// Retry attempts on 429/5xx responses.
    pub max_retries: u32,
    pub track_cache_size: usize,
    pub track_cache_ttl: Duration,
    pub release_cache_size: usize,
    pub release_cache_ttl: Duration,
    pub search_cache_size: usize,
    pub search_cache_ttl: Duration,
    pub image_cache_size: usize,
    pub image_cache_ttl: Duration,
}

impl DiscogsConfig {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            rate_limit_per_minute: 50,
            max_concurrent_requests: 5,
            max_retries: 2,
            track_cache_size: 1_000,
            track_cache_ttl: Duration::from_secs(3_600),
            release_cache_size: 500,
            release_cache_ttl: Duration::from_secs(4 * 3_600),
            search_cache_size: 1_000,
            search_cache_ttl: Duration::from_secs(3_600),
            image_cache_size: 500,
            image_cache_ttl: Duration::from_secs(24 * 3_600),
        }
    }
}
