// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Environment parsing and tracing/log initialization.

use std::{
    env::{self, VarError},
    fmt::Display,
    str::FromStr,
    time::Duration,
};

use dotenv::dotenv;
use tracing::subscriber::set_global_default;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub fn init_environment() {
    if let Ok(path) = dotenv() {
        // Print to stderr because logging has not been initialized yet
        eprintln!("Loaded environment from dotenv file {path:?}");
    }
}

const TRACING_SUBSCRIBER_ENV_FILTER_DEFAULT: &str = "info";

fn create_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(TRACING_SUBSCRIBER_ENV_FILTER_DEFAULT))
}

pub fn init_tracing_and_logging() -> anyhow::Result<()> {
    // Capture and redirect all log messages as tracing events
    LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(create_env_filter())
        .with_writer(std::io::stderr)
        .finish();
    set_global_default(subscriber)?;
    Ok(())
}

// Prevents warning messages when reading environment variables that are
// not present
fn read_optional_var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(var) if !var.trim().is_empty() => Some(var),
        Ok(_) => None,
        Err(VarError::NotPresent) => None,
        Err(err) => {
            log::warn!("Failed to read '{key}': {err}");
            None
        }
    }
}

fn parse_var<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let var = read_optional_var(key)?;
    log::debug!("{key} = {var}");
    match var.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Failed to parse '{key}' = '{var}': {err}");
            None
        }
    }
}

fn parse_duration_secs(key: &str) -> Option<Duration> {
    parse_var::<u64>(key).map(Duration::from_secs)
}

const ENDPOINT_IP_ENV: &str = "ENDPOINT_IP";
const ENDPOINT_PORT_ENV: &str = "ENDPOINT_PORT";
const LIBRARY_DB_PATH_ENV: &str = "LIBRARY_DB_PATH";
const DATABASE_CONNECTION_POOL_SIZE_ENV: &str = "DATABASE_CONNECTION_POOL_SIZE";
const DISCOGS_TOKEN_ENV: &str = "DISCOGS_TOKEN";
const DISCOGS_CACHE_URL_ENV: &str = "DISCOGS_CACHE_URL";
const DISCOGS_RATE_LIMIT_ENV: &str = "DISCOGS_RATE_LIMIT";
const DISCOGS_MAX_CONCURRENT_ENV: &str = "DISCOGS_MAX_CONCURRENT";
const DISCOGS_MAX_RETRIES_ENV: &str = "DISCOGS_MAX_RETRIES";
const DISCOGS_CACHE_MAXSIZE_ENV: &str = "DISCOGS_CACHE_MAXSIZE";
const DISCOGS_TRACK_CACHE_TTL_ENV: &str = "DISCOGS_TRACK_CACHE_TTL";
const DISCOGS_RELEASE_CACHE_TTL_ENV: &str = "DISCOGS_RELEASE_CACHE_TTL";
const DISCOGS_SEARCH_CACHE_TTL_ENV: &str = "DISCOGS_SEARCH_CACHE_TTL";
const ADMIN_TOKEN_ENV: &str = "ADMIN_TOKEN";

pub fn parse_config_into(config: &mut Config) {
    if let Some(ip_addr) = parse_var(ENDPOINT_IP_ENV) {
        config.endpoint.ip_addr = ip_addr;
    }
    if let Some(port) = parse_var(ENDPOINT_PORT_ENV) {
        config.endpoint.port = port;
    }
    if let Some(path) = read_optional_var(LIBRARY_DB_PATH_ENV) {
        config.library_db_path = path.into();
    }
    if let Some(pool_size) = parse_var(DATABASE_CONNECTION_POOL_SIZE_ENV) {
        config.database_connection_pool_size = pool_size;
    }
    if let Some(token) = read_optional_var(DISCOGS_TOKEN_ENV) {
        config.discogs_token = Some(token);
    }
    if let Some(url) = read_optional_var(DISCOGS_CACHE_URL_ENV) {
        config.discogs_cache_url = Some(url);
    }
    if let Some(rate_limit) = parse_var(DISCOGS_RATE_LIMIT_ENV) {
        config.discogs_rate_limit_per_minute = rate_limit;
    }
    if let Some(max_concurrent) = parse_var(DISCOGS_MAX_CONCURRENT_ENV) {
        config.discogs_max_concurrent = max_concurrent;
    }
    if let Some(max_retries) = parse_var(DISCOGS_MAX_RETRIES_ENV) {
        config.discogs_max_retries = max_retries;
    }
    if let Some(maxsize) = parse_var(DISCOGS_CACHE_MAXSIZE_ENV) {
        config.discogs_cache_maxsize = maxsize;
    }
    if let Some(ttl) = parse_duration_secs(DISCOGS_TRACK_CACHE_TTL_ENV) {
        config.discogs_track_cache_ttl = ttl;
    }
    if let Some(ttl) = parse_duration_secs(DISCOGS_RELEASE_CACHE_TTL_ENV) {
        config.discogs_release_cache_ttl = ttl;
    }
    if let Some(ttl) = parse_duration_secs(DISCOGS_SEARCH_CACHE_TTL_ENV) {
        config.discogs_search_cache_ttl = ttl;
    }
    if let Some(token) = read_optional_var(ADMIN_TOKEN_ENV) {
        config.admin_token = Some(token);
    }
}
