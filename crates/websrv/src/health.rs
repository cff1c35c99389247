// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Health endpoint with real connectivity probes.
//!
//! All backends are probed in parallel with a per-probe timeout. The
//! catalog is the core dependency: without it the service is unhealthy
//! (503); a missing metadata tier or persistent cache only degrades it.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::Serialize;
use warp::http::StatusCode;

use euterpe_discogs::service::DiscogsService;
use euterpe_repo_sqlite::store::CatalogStore;

const CHECK_TIMEOUT: Duration = Duration::from_secs(3);

const STATUS_OK: &str = "ok";
const STATUS_ERROR: &str = "error";
const STATUS_TIMEOUT: &str = "timeout";
const STATUS_UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub version: &'static str,
    pub services: BTreeMap<&'static str, &'static str>,
}

fn probe_status(available: Option<bool>) -> &'static str {
    match available {
        Some(true) => STATUS_OK,
        Some(false) => STATUS_ERROR,
        None => STATUS_TIMEOUT,
    }
}

async fn run_probe<F>(probe: F) -> Option<bool>
where
    F: std::future::Future<Output = bool>,
{
    tokio::time::timeout(CHECK_TIMEOUT, probe).await.ok()
}

/// Derive the overall status: the catalog must be reachable, the
/// optional backends only count when they are configured.
fn classify(services: &BTreeMap<&'static str, &'static str>) -> (&'static str, StatusCode) {
    let core_ok = services.get("database").copied() == Some(STATUS_OK);
    let all_configured_ok = services
        .values()
        .all(|status| matches!(*status, STATUS_OK | STATUS_UNAVAILABLE));

    if core_ok && all_configured_ok {
        ("healthy", StatusCode::OK)
    } else if core_ok {
        ("degraded", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    }
}

pub async fn health_check(
    store: Option<Arc<CatalogStore>>,
    discogs: Option<Arc<DiscogsService>>,
) -> (HealthBody, StatusCode) {
    let database = async {
        match &store {
            Some(store) => run_probe(store.is_available()).await,
            None => Some(false),
        }
    };
    let discogs_api = async {
        match &discogs {
            Some(service) => run_probe(service.check_api())
                .await
                .map(probe_status_from_bool),
            None => Some(STATUS_UNAVAILABLE),
        }
    };
    let discogs_cache = async {
        match &discogs {
            Some(service) if service.has_persistent_cache() => {
                run_probe(async { service.check_cache().await.unwrap_or(false) })
                    .await
                    .map(probe_status_from_bool)
            }
            _ => Some(STATUS_UNAVAILABLE),
        }
    };

    let (database, discogs_api, discogs_cache) =
        tokio::join!(database, discogs_api, discogs_cache);

    let mut services = BTreeMap::new();
    services.insert("database", probe_status(database));
    services.insert("discogs_api", discogs_api.unwrap_or(STATUS_TIMEOUT));
    services.insert("discogs_cache", discogs_cache.unwrap_or(STATUS_TIMEOUT));

    let (status, status_code) = classify(&services);
    let body = HealthBody {
        status,
        version: env!("CARGO_PKG_VERSION"),
        services,
    };
    (body, status_code)
}

fn probe_status_from_bool(available: bool) -> &'static str {
    if available {
        STATUS_OK
    } else {
        STATUS_ERROR
    }
}
