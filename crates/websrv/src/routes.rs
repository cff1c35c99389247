// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The warp route tree.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use euterpe_core::{
    library::LibraryItem,
    lookup::LookupRequest,
    release::{Artwork, ReleaseRef},
    stats::RequestContext,
};
use euterpe_discogs::service::DiscogsService;
use euterpe_repo_sqlite::store::CatalogStore;
use euterpe_usecases::{
    orchestrator::perform_lookup,
    ports::{LibraryStore as _, ReleaseMetadata, ReleaseQuery, SearchOptions},
};

use crate::{
    api::{handle_rejection, reject_on_error, Error},
    health,
};

type Store = Option<Arc<CatalogStore>>;
type Metadata = Option<Arc<DiscogsService>>;

#[derive(Debug, Deserialize)]
struct SkipCacheParams {
    #[serde(default)]
    skip_cache: bool,
}

#[derive(Debug, Deserialize)]
struct LibrarySearchParams {
    q: Option<String>,
    #[serde(default = "default_library_limit")]
    limit: usize,
}

fn default_library_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct LibrarySearchResponse {
    results: Vec<LibraryItem>,
    total: usize,
    query: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchBody {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    track: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchParams {
    #[serde(default = "default_release_limit")]
    limit: usize,
}

fn default_release_limit() -> usize {
    5
}

#[derive(Debug, Serialize)]
struct ReleaseSearchResponse {
    results: Vec<Artwork>,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct TrackReleasesParams {
    track: String,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default = "default_track_limit")]
    limit: usize,
}

fn default_track_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
struct TrackReleasesResponse {
    track: String,
    artist: Option<String>,
    releases: Vec<ReleaseRef>,
    total: usize,
}

fn require_discogs(discogs: Metadata) -> Result<Arc<DiscogsService>, Rejection> {
    discogs.ok_or_else(|| reject_on_error(Error::ServiceUnavailable))
}

fn require_store(store: Store) -> Result<Arc<CatalogStore>, Rejection> {
    store.ok_or_else(|| reject_on_error(Error::ServiceUnavailable))
}

async fn handle_lookup(
    params: SkipCacheParams,
    request: LookupRequest,
    store: Store,
    discogs: Metadata,
) -> Result<impl Reply, Rejection> {
    let store = require_store(store)?;
    let ctx = RequestContext::new(params.skip_cache || request.skip_cache);
    let metadata = discogs
        .as_deref()
        .map(|service| service as &dyn ReleaseMetadata);
    let response = perform_lookup(&request, store.as_ref(), metadata, &ctx)
        .await
        .map_err(reject_on_error)?;
    Ok(warp::reply::json(&response))
}

async fn handle_library_search(
    params: LibrarySearchParams,
    store: Store,
) -> Result<impl Reply, Rejection> {
    let store = require_store(store)?;
    let Some(query) = params.q.filter(|q| !q.trim().is_empty()) else {
        return Err(reject_on_error(Error::BadRequest(anyhow::anyhow!(
            "query parameter 'q' must be provided"
        ))));
    };
    let limit = params.limit.clamp(1, 100);
    let results = store
        .search(&query, SearchOptions::default().with_limit(limit))
        .await
        .map_err(reject_on_error)?;
    Ok(warp::reply::json(&LibrarySearchResponse {
        total: results.len(),
        results,
        query,
    }))
}

async fn handle_release_search(
    params: ReleaseSearchParams,
    body: ReleaseSearchBody,
    discogs: Metadata,
) -> Result<impl Reply, Rejection> {
    let service = require_discogs(discogs)?;
    if body.artist.is_none() && body.album.is_none() && body.track.is_none() {
        return Err(reject_on_error(Error::BadRequest(anyhow::anyhow!(
            "at least one of artist, album or track must be provided"
        ))));
    }
    let query = ReleaseQuery {
        artist: body.artist,
        album: body.album,
        track: body.track,
    };
    let ctx = RequestContext::default();
    let results = service
        .search(&query, params.limit.clamp(1, 50), &ctx)
        .await
        .map_err(reject_on_error)?;
    Ok(warp::reply::json(&ReleaseSearchResponse {
        total: results.len(),
        results,
    }))
}

async fn handle_track_releases(
    params: TrackReleasesParams,
    discogs: Metadata,
) -> Result<impl Reply, Rejection> {
    let service = require_discogs(discogs)?;
    let ctx = RequestContext::default();
    let releases = service
        .search_releases_by_track(
            params.artist.as_deref(),
            &params.track,
            params.limit.clamp(1, 100),
            &ctx,
        )
        .await
        .map_err(reject_on_error)?;
    Ok(warp::reply::json(&TrackReleasesResponse {
        track: params.track,
        artist: params.artist,
        total: releases.len(),
        releases,
    }))
}

async fn handle_get_release(
    release_id: i64,
    discogs: Metadata,
) -> Result<impl Reply, Rejection> {
    let service = require_discogs(discogs)?;
    let ctx = RequestContext::default();
    let release = service
        .get_release(release_id, &ctx)
        .await
        .map_err(reject_on_error)?;
    match release {
        Some(release) => Ok(warp::reply::json(&release)),
        None => Err(reject_on_error(Error::NotFound)),
    }
}

pub fn create_filters(
    store: Store,
    discogs: Metadata,
    admin_token: Option<String>,
    shutdown_tx: mpsc::UnboundedSender<()>,
) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
    let with_store = {
        let store = store.clone();
        warp::any().map(move || store.clone())
    };
    let with_discogs = {
        let discogs = discogs.clone();
        warp::any().map(move || discogs.clone())
    };

    let api_v1 = || warp::path("api").and(warp::path("v1"));
    let discogs_path = warp::path("discogs");

    // POST /api/v1/lookup
    let lookup = warp::post()
        .and(api_v1())
        .and(warp::path("lookup"))
        .and(warp::path::end())
        .and(warp::query())
        .and(warp::body::json())
        .and(with_store.clone())
        .and(with_discogs.clone())
        .and_then(handle_lookup);

    // GET /api/v1/library/search
    let library_search = warp::get()
        .and(api_v1())
        .and(warp::path("library"))
        .and(warp::path("search"))
        .and(warp::path::end())
        .and(warp::query())
        .and(with_store.clone())
        .and_then(handle_library_search);

    // POST /api/v1/discogs/search
    let release_search = warp::post()
        .and(api_v1())
        .and(discogs_path)
        .and(warp::path("search"))
        .and(warp::path::end())
        .and(warp::query())
        .and(warp::body::json())
        .and(with_discogs.clone())
        .and_then(handle_release_search);

    // GET /api/v1/discogs/track-releases
    let track_releases = warp::get()
        .and(api_v1())
        .and(discogs_path)
        .and(warp::path("track-releases"))
        .and(warp::path::end())
        .and(warp::query())
        .and(with_discogs.clone())
        .and_then(handle_track_releases);

    // GET /api/v1/discogs/release/{id}
    let get_release = warp::get()
        .and(api_v1())
        .and(discogs_path)
        .and(warp::path("release"))
        .and(warp::path::param::<i64>())
        .and(warp::path::end())
        .and(with_discogs.clone())
        .and_then(handle_get_release);

    // GET /health
    let health = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(with_store)
        .and(with_discogs)
        .and_then(|store: Store, discogs: Metadata| async move {
            let (body, status_code) = health::health_check(store, discogs).await;
            Ok::<_, Rejection>(warp::reply::with_status(
                warp::reply::json(&body),
                status_code,
            ))
        });

    // POST /shutdown, guarded by the admin bearer token when configured
    let shutdown = warp::post()
        .and(warp::path("shutdown"))
        .and(warp::path::end())
        .and(warp::header::optional::<String>("authorization"))
        .and_then(move |authorization: Option<String>| {
            let admin_token = admin_token.clone();
            let shutdown_tx = shutdown_tx.clone();
            async move {
                if let Some(expected) = &admin_token {
                    let authorized = authorization
                        .as_deref()
                        .and_then(|header| header.strip_prefix("Bearer "))
                        .is_some_and(|token| token == expected);
                    if !authorized {
                        return Ok::<_, Rejection>(StatusCode::UNAUTHORIZED);
                    }
                }
                Ok::<_, Rejection>(
                    shutdown_tx
                        .send(())
                        .map(|()| StatusCode::ACCEPTED)
                        .unwrap_or_else(|_| {
                            log::warn!("Failed to forward shutdown request");
                            StatusCode::BAD_GATEWAY
                        }),
                )
            }
        });

    lookup
        .or(library_search)
        .or(release_search)
        .or(track_releases)
        .or(get_release)
        .or(health)
        .or(shutdown)
        .with(warp::cors().allow_any_origin())
        .recover(handle_rejection)
}
