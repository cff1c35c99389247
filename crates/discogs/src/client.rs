// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rate-limited Discogs HTTP client.
//!
//! Every request passes both gates of [`RequestGate`]; 429 and 5xx
//! responses are retried with exponential backoff. The
//! `X-Discogs-Ratelimit-Remaining` header is logged but not acted on.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};

use euterpe_core::{
    release::{release_url, Release, Track},
    stats::RequestContext,
};

use crate::{ratelimit::RequestGate, DiscogsConfig, Error, Result};

pub const DISCOGS_API_BASE: &str = "https://api.discogs.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A parsed row from the upstream release search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub release_id: i64,
    pub artist: String,
    pub album: String,
    pub thumb: Option<String>,
}

/// The upstream tier of the metadata service.
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// Strict search pinning artist and track-title parameters.
    async fn track_search(
        &self,
        artist: Option<&str>,
        track: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>>;

    /// Free-text release search.
    async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>>;

    /// Strict search pinning artist and release-title parameters; at
    /// least one must be present.
    async fn release_title_search(
        &self,
        artist: Option<&str>,
        title: Option<&str>,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>>;

    async fn get_release(&self, release_id: i64, ctx: &RequestContext)
        -> Result<Option<Release>>;

    async fn get_artist_image(
        &self,
        artist_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<String>>;

    async fn get_label_image(
        &self,
        label_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<String>>;

    /// Connectivity probe for the health endpoint.
    async fn check(&self) -> bool;
}

// ---------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NameRef {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    #[serde(default)]
    position: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    artists: Vec<NameRef>,
}

#[derive(Debug, Deserialize)]
struct ImageRow {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseBody {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    artists: Vec<NameRef>,
    #[serde(default)]
    labels: Vec<NameRef>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    styles: Vec<String>,
    #[serde(default)]
    tracklist: Vec<TrackRow>,
    #[serde(default)]
    images: Vec<ImageRow>,
}

#[derive(Debug, Deserialize)]
struct ImagesBody {
    #[serde(default)]
    images: Vec<ImageRow>,
}

/// Split the upstream `"Artist - Album"` title format.
fn parse_title(title: &str) -> (String, String) {
    match title.split_once(" - ") {
        Some((artist, album)) => (artist.trim().to_owned(), album.trim().to_owned()),
        None => (String::new(), title.trim().to_owned()),
    }
}

fn hit_from_row(row: SearchRow) -> SearchHit {
    let (artist, album) = parse_title(&row.title);
    let thumb = row
        .thumb
        .filter(|thumb| !thumb.is_empty() && !thumb.contains("spacer.gif"));
    SearchHit {
        release_id: row.id,
        artist,
        album,
        thumb,
    }
}

fn release_from_body(body: ReleaseBody) -> Release {
    let artist = body
        .artists
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    let artist_id = body.artists.first().and_then(|a| a.id);
    let label = body.labels.first().map(|l| l.name.clone());
    let label_id = body.labels.first().and_then(|l| l.id);
    let artwork_url = body.images.first().and_then(|image| image.uri.clone());
    Release {
        release_id: body.id,
        title: body.title,
        artist,
        year: body.year,
        label,
        artist_id,
        label_id,
        genres: body.genres,
        styles: body.styles,
        tracklist: body
            .tracklist
            .into_iter()
            .map(|row| Track {
                position: row.position,
                title: row.title,
                duration: row.duration,
                artists: row.artists.into_iter().map(|a| a.name).collect(),
            })
            .collect(),
        artwork_url,
        release_url: release_url(body.id),
        cached: false,
    }
}

// ---------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------

#[allow(missing_debug_implementations)]
pub struct DiscogsClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    gate: RequestGate,
    max_retries: u32,
}

impl DiscogsClient {
    #[must_use]
    pub fn new(config: &DiscogsConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("euterpe/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            token: config.token.clone(),
            base_url: DISCOGS_API_BASE.to_owned(),
            gate: RequestGate::new(config.rate_limit_per_minute, config.max_concurrent_requests),
            max_retries: config.max_retries,
        }
    }

    fn auth_header(&self) -> String {
        format!("Discogs token={}", self.token)
    }

    /// GET a JSON body. `Ok(None)` is a 404; 429/5xx are retried with
    /// `2^attempt` second backoff up to `max_retries`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        ctx: &RequestContext,
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        loop {
            let permit = self.gate.acquire().await;
            let started = Instant::now();
            let sent = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, self.auth_header())
                .query(query)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(err) => {
                    drop(permit);
                    ctx.stats.record_api_call();
                    ctx.stats.record_api_time(started.elapsed());
                    return Err(err.into());
                }
            };

            if let Some(remaining) = response
                .headers()
                .get("X-Discogs-Ratelimit-Remaining")
                .and_then(|value| value.to_str().ok())
            {
                log::debug!("Discogs rate limit remaining: {remaining}");
            }

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                drop(permit);
                ctx.stats.record_api_call();
                ctx.stats.record_api_time(started.elapsed());
                if attempt < self.max_retries {
                    let delay = Duration::from_secs(1 << attempt);
                    log::warn!(
                        "Discogs returned {status}, retrying in {}s (attempt {}/{})",
                        delay.as_secs(),
                        attempt + 1,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                    log::error!("Discogs rate limit hit, max retries exhausted");
                    Error::RateLimited
                } else {
                    Error::UpstreamStatus { status }
                });
            }

            if status == StatusCode::NOT_FOUND {
                drop(permit);
                ctx.stats.record_api_call();
                ctx.stats.record_api_time(started.elapsed());
                return Ok(None);
            }
            if !status.is_success() {
                drop(permit);
                ctx.stats.record_api_call();
                ctx.stats.record_api_time(started.elapsed());
                return Err(Error::UpstreamStatus { status });
            }

            // Hold the concurrency permit until the body is consumed.
            let parsed = response.json::<T>().await;
            drop(permit);
            ctx.stats.record_api_call();
            ctx.stats.record_api_time(started.elapsed());
            return Ok(Some(parsed?));
        }
    }

    async fn database_search(
        &self,
        mut params: Vec<(&'static str, String)>,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>> {
        params.push(("type", "release".to_owned()));
        params.push(("per_page", limit.to_string()));
        let page: Option<SearchPage> = self.get_json("/database/search", &params, ctx).await?;
        Ok(page
            .map(|page| page.results.into_iter().map(hit_from_row).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReleaseApi for DiscogsClient {
    async fn track_search(
        &self,
        artist: Option<&str>,
        track: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>> {
        let mut params = vec![("track", track.to_owned())];
        if let Some(artist) = artist {
            params.push(("artist", artist.to_owned()));
        }
        self.database_search(params, limit, ctx).await
    }

    async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>> {
        self.database_search(vec![("q", query.to_owned())], limit, ctx)
            .await
    }

    async fn release_title_search(
        &self,
        artist: Option<&str>,
        title: Option<&str>,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchHit>> {
        let mut params = Vec::new();
        if let Some(title) = title {
            params.push(("release_title", title.to_owned()));
        }
        if let Some(artist) = artist {
            params.push(("artist", artist.to_owned()));
        }
        self.database_search(params, limit, ctx).await
    }

    async fn get_release(
        &self,
        release_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<Release>> {
        let body: Option<ReleaseBody> = self
            .get_json(&format!("/releases/{release_id}"), &[], ctx)
            .await?;
        Ok(body.map(release_from_body))
    }

    async fn get_artist_image(
        &self,
        artist_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<String>> {
        let body: Option<ImagesBody> = self
            .get_json(&format!("/artists/{artist_id}"), &[], ctx)
            .await?;
        Ok(body.and_then(|body| body.images.into_iter().next().and_then(|image| image.uri)))
    }

    async fn get_label_image(
        &self,
        label_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<String>> {
        let body: Option<ImagesBody> = self
            .get_json(&format!("/labels/{label_id}"), &[], ctx)
            .await?;
        Ok(body.and_then(|body| body.images.into_iter().next().and_then(|image| image.uri)))
    }

    async fn check(&self) -> bool {
        let url = format!("{}/oauth/identity", self.base_url);
        match self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }
}
