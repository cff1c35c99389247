// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The euterpe server binary: resolves ambiguous music request strings
//! against the station's catalog, enriched with external release
//! metadata.

#![warn(rust_2018_idioms)]

use std::{net::SocketAddr, sync::Arc};

use tokio::{signal, sync::mpsc};

use euterpe_discogs::{pg_cache::PgReleaseCache, service::DiscogsService};
use euterpe_repo_sqlite::store::CatalogStore;

use crate::config::Config;

mod api;
mod config;
mod env;
mod health;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env::init_environment();
    env::init_tracing_and_logging()?;

    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::default();
    env::parse_config_into(&mut config);

    let endpoint_addr = SocketAddr::new(config.endpoint.ip_addr, config.endpoint.port);
    tracing::info!("Endpoint address: {endpoint_addr}");
    tracing::info!("Catalog file: {}", config.library_db_path.display());

    // A missing catalog file must not prevent startup; the routes then
    // answer with 503 and the health endpoint reports unhealthy until
    // the file is put in place and the service restarted.
    let store = match CatalogStore::open(
        &config.library_db_path,
        config.database_connection_pool_size,
    ) {
        Ok(store) => Some(Arc::new(store)),
        Err(err) => {
            tracing::warn!("Catalog store unavailable: {err}");
            None
        }
    };

    let discogs = match config.discogs_config() {
        Some(discogs_config) => {
            let pg = match &config.discogs_cache_url {
                Some(url) => match PgReleaseCache::connect(url).await {
                    Ok(pg) => {
                        if let Err(err) = pg.ensure_schema().await {
                            tracing::warn!("Failed to prepare release cache schema: {err}");
                        }
                        Some(pg)
                    }
                    Err(err) => {
                        tracing::warn!("Persistent release cache unavailable: {err}");
                        None
                    }
                },
                None => None,
            };
            Some(Arc::new(DiscogsService::new(&discogs_config, pg)))
        }
        None => {
            tracing::info!("DISCOGS_TOKEN not set, metadata tier disabled");
            None
        }
    };

    tracing::info!("Creating service routes");
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<()>();
    let filters = routes::create_filters(store, discogs, config.admin_token.clone(), shutdown_tx);

    let server = warp::serve(filters);
    let (socket_addr, server_listener) =
        server.bind_with_graceful_shutdown(endpoint_addr, async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                _ = signal::ctrl_c() => {}
            }
            tracing::info!("Stopping");
        });

    tracing::info!("Listening on {socket_addr}");
    server_listener.await;
    tracing::info!("Stopped");

    Ok(())
}
