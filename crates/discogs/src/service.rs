// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The tiered metadata façade.
//!
//! Every operation probes memory, then the persistent cache, then the
//! upstream API. A hit at a deeper tier is written back to the
//! shallower ones, and values served from any cache carry
//! `cached = true`. Persistent-tier failures always degrade to a miss.

use std::{collections::HashSet, sync::Arc, time::Instant};

use async_trait::async_trait;

use euterpe_core::{
    matching::{calculate_confidence, is_compilation_artist},
    release::{release_url, Artwork, Release, ReleaseRef},
    stats::RequestContext,
};
use euterpe_usecases::ports::{ReleaseMetadata, ReleaseQuery};

use crate::{
    client::{DiscogsClient, ReleaseApi, SearchHit},
    memory_cache::{cache_key, TtlCache},
    pg_cache::PgReleaseCache,
    DiscogsConfig, Result,
};

/// Fewer strict-phase results than this trigger the keyword
/// supplement.
const KEYWORD_SUPPLEMENT_THRESHOLD: usize = 3;

#[allow(missing_debug_implementations)]
pub struct DiscogsService {
    api: Arc<dyn ReleaseApi>,
    pg: Option<PgReleaseCache>,
    track_cache: TtlCache<Vec<ReleaseRef>>,
    release_cache: TtlCache<Release>,
    search_cache: TtlCache<Vec<Artwork>>,
    artist_image_cache: TtlCache<String>,
    label_image_cache: TtlCache<String>,
}

fn push_hit(releases: &mut Vec<ReleaseRef>, seen_albums: &mut HashSet<String>, hit: SearchHit) {
    if hit.album.is_empty() {
        return;
    }
    if !seen_albums.insert(hit.album.to_lowercase()) {
        return;
    }
    releases.push(ReleaseRef {
        release_id: hit.release_id,
        release_url: release_url(hit.release_id),
        title: hit.album,
        is_compilation: is_compilation_artist(&hit.artist),
        artist: hit.artist,
    });
}

fn sort_by_confidence(results: &mut [Artwork]) {
    results.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

impl DiscogsService {
    #[must_use]
    pub fn new(config: &DiscogsConfig, pg: Option<PgReleaseCache>) -> Self {
        Self::with_api(Arc::new(DiscogsClient::new(config)), config, pg)
    }

    #[must_use]
    pub fn with_api(
        api: Arc<dyn ReleaseApi>,
        config: &DiscogsConfig,
        pg: Option<PgReleaseCache>,
    ) -> Self {
        Self {
            api,
            pg,
            track_cache: TtlCache::new(config.track_cache_size, config.track_cache_ttl),
            release_cache: TtlCache::new(config.release_cache_size, config.release_cache_ttl),
            search_cache: TtlCache::new(config.search_cache_size, config.search_cache_ttl),
            artist_image_cache: TtlCache::new(config.image_cache_size, config.image_cache_ttl),
            label_image_cache: TtlCache::new(config.image_cache_size, config.image_cache_ttl),
        }
    }

    #[must_use]
    pub fn has_persistent_cache(&self) -> bool {
        self.pg.is_some()
    }

    /// Upstream connectivity probe.
    pub async fn check_api(&self) -> bool {
        self.api.check().await
    }

    /// Persistent cache probe; `None` when the tier is unconfigured.
    pub async fn check_cache(&self) -> Option<bool> {
        match &self.pg {
            Some(pg) => Some(pg.is_available().await),
            None => None,
        }
    }

    /// All releases containing the given track: a strict track query,
    /// supplemented by a keyword query when it comes back sparse.
    pub async fn search_releases_by_track(
        &self,
        artist: Option<&str>,
        track: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<ReleaseRef>> {
        let key = cache_key(
            "track_releases",
            &[artist.unwrap_or_default(), track, &limit.to_string()],
        );
        if let Some(cached) = self.track_cache.get(&key, ctx) {
            return Ok(cached);
        }

        if let Some(pg) = &self.pg {
            if !ctx.skip_cache {
                let started = Instant::now();
                let lookup = pg.lookup_releases_by_track(track, artist, limit).await;
                ctx.stats.record_pg_time(started.elapsed());
                match lookup {
                    Ok(releases) if !releases.is_empty() => {
                        log::info!("Cache hit: {} releases for '{track}'", releases.len());
                        ctx.stats.record_pg_hit();
                        self.track_cache.insert(key, releases.clone(), ctx);
                        return Ok(releases);
                    }
                    Ok(_) => {
                        log::debug!("Cache miss for track '{track}'");
                        ctx.stats.record_pg_miss();
                    }
                    Err(err) => {
                        log::warn!("Cache lookup failed, falling back to API: {err}");
                    }
                }
            }
        }

        log::info!("Searching upstream for releases with track '{track}', artist: {artist:?}");
        let mut releases: Vec<ReleaseRef> = Vec::new();
        let mut seen_albums: HashSet<String> = HashSet::new();
        for hit in self.api.track_search(artist, track, limit, ctx).await? {
            push_hit(&mut releases, &mut seen_albums, hit);
        }

        if releases.len() < KEYWORD_SUPPLEMENT_THRESHOLD {
            let query = match artist {
                Some(artist) => format!("{artist} {track}"),
                None => track.to_owned(),
            };
            log::info!("Supplementing with keyword search: '{query}'");
            for hit in self.api.keyword_search(&query, limit, ctx).await? {
                push_hit(&mut releases, &mut seen_albums, hit);
            }
        }

        releases.truncate(limit);
        self.track_cache.insert(key, releases.clone(), ctx);
        Ok(releases)
    }

    /// Full release metadata by id, with write-back into both cache
    /// tiers. `None` (not found) is never cached.
    pub async fn get_release(
        &self,
        release_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<Release>> {
        let key = cache_key("release", &[&release_id.to_string()]);
        if let Some(mut release) = self.release_cache.get(&key, ctx) {
            release.cached = true;
            return Ok(Some(release));
        }

        if let Some(pg) = &self.pg {
            if !ctx.skip_cache {
                let started = Instant::now();
                let lookup = pg.lookup_release(release_id).await;
                ctx.stats.record_pg_time(started.elapsed());
                match lookup {
                    Ok(Some(release)) => {
                        log::info!("Cache hit: release {release_id}");
                        ctx.stats.record_pg_hit();
                        self.release_cache.insert(key, release.clone(), ctx);
                        return Ok(Some(release));
                    }
                    Ok(None) => {
                        log::debug!("Cache miss for release {release_id}");
                        ctx.stats.record_pg_miss();
                    }
                    Err(err) => {
                        log::warn!("Cache lookup failed, falling back to API: {err}");
                    }
                }
            }
        }

        let fetched = self.api.get_release(release_id, ctx).await?;
        if let Some(release) = &fetched {
            self.release_cache.insert(key, release.clone(), ctx);
            if let Some(pg) = &self.pg {
                if !ctx.skip_cache {
                    if let Err(err) = pg.write_release(release).await {
                        log::warn!("Failed to cache release {release_id}: {err}");
                    }
                }
            }
        } else {
            log::debug!("Release {release_id} not found upstream");
        }
        Ok(fetched)
    }

    /// Artwork-oriented release search, ranked by confidence against the
    /// requested artist/album.
    pub async fn search(
        &self,
        query: &ReleaseQuery,
        limit: usize,
        ctx: &RequestContext,
    ) -> Result<Vec<Artwork>> {
        let artist_query = query.artist.as_deref();
        let album_query = query.album.as_deref().or(query.track.as_deref());
        if artist_query.is_none() && album_query.is_none() {
            log::warn!("No searchable fields in release query");
            return Ok(Vec::new());
        }

        let key = cache_key(
            "search",
            &[
                artist_query.unwrap_or_default(),
                album_query.unwrap_or_default(),
                &limit.to_string(),
            ],
        );
        if let Some(mut cached) = self.search_cache.get(&key, ctx) {
            for artwork in &mut cached {
                artwork.cached = true;
            }
            return Ok(cached);
        }

        if let Some(pg) = &self.pg {
            if !ctx.skip_cache {
                let started = Instant::now();
                let lookup = pg.search_releases(artist_query, album_query, limit).await;
                ctx.stats.record_pg_time(started.elapsed());
                match lookup {
                    Ok(rows) if !rows.is_empty() => {
                        log::info!("Cache hit: {} releases for search", rows.len());
                        ctx.stats.record_pg_hit();
                        let mut results: Vec<Artwork> = rows
                            .into_iter()
                            .map(|row| Artwork {
                                confidence: calculate_confidence(
                                    artist_query,
                                    query.album.as_deref(),
                                    &row.artist,
                                    &row.title,
                                ),
                                album: row.title,
                                artist: row.artist,
                                release_id: row.release_id,
                                release_url: release_url(row.release_id),
                                artwork_url: row.artwork_url,
                                cached: true,
                            })
                            .collect();
                        sort_by_confidence(&mut results);
                        self.search_cache.insert(key, results.clone(), ctx);
                        return Ok(results);
                    }
                    Ok(_) => {
                        log::debug!("Cache miss for search");
                        ctx.stats.record_pg_miss();
                    }
                    Err(err) => {
                        log::warn!("Cache search failed, falling back to API: {err}");
                    }
                }
            }
        }

        let strict = self
            .api
            .release_title_search(artist_query, album_query, limit, ctx)
            .await?;
        let hits = if strict.is_empty() {
            let fuzzy_query = [artist_query, query.album.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if fuzzy_query.is_empty() {
                strict
            } else {
                log::info!("Strict search empty, trying fuzzy query: '{fuzzy_query}'");
                self.api.keyword_search(&fuzzy_query, limit, ctx).await?
            }
        } else {
            strict
        };

        let mut results: Vec<Artwork> = hits
            .into_iter()
            .map(|hit| Artwork {
                confidence: calculate_confidence(
                    artist_query,
                    query.album.as_deref(),
                    &hit.artist,
                    &hit.album,
                ),
                album: hit.album,
                artist: hit.artist,
                release_id: hit.release_id,
                release_url: release_url(hit.release_id),
                artwork_url: hit.thumb,
                cached: false,
            })
            .collect();
        sort_by_confidence(&mut results);
        self.search_cache.insert(key, results.clone(), ctx);
        Ok(results)
    }

    /// Whether the given track by the given artist appears on the
    /// release's tracklist.
    pub async fn validate_track_on_release(
        &self,
        release_id: i64,
        track: &str,
        artist: &str,
        ctx: &RequestContext,
    ) -> Result<bool> {
        let Some(release) = self.get_release(release_id, ctx).await? else {
            return Ok(false);
        };
        let found = release.contains_track(track, artist);
        if found {
            log::info!("Validated: '{track}' by '{artist}' found on release {release_id}");
        } else {
            log::info!("Track '{track}' by '{artist}' NOT found on release {release_id}");
        }
        Ok(found)
    }

    pub async fn get_artist_image(
        &self,
        artist_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<String>> {
        let key = cache_key("artist_image", &[&artist_id.to_string()]);
        if let Some(image) = self.artist_image_cache.get(&key, ctx) {
            return Ok(Some(image));
        }
        let image = self.api.get_artist_image(artist_id, ctx).await?;
        if let Some(image) = &image {
            self.artist_image_cache.insert(key, image.clone(), ctx);
        }
        Ok(image)
    }

    pub async fn get_label_image(
        &self,
        label_id: i64,
        ctx: &RequestContext,
    ) -> Result<Option<String>> {
        let key = cache_key("label_image", &[&label_id.to_string()]);
        if let Some(image) = self.label_image_cache.get(&key, ctx) {
            return Ok(Some(image));
        }
        let image = self.api.get_label_image(label_id, ctx).await?;
        if let Some(image) = &image {
            self.label_image_cache.insert(key, image.clone(), ctx);
        }
        Ok(image)
    }
}

#[async_trait]
impl ReleaseMetadata for DiscogsService {
    async fn search_releases_by_track(
        &self,
        artist: Option<&str>,
        track: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> anyhow::Result<Vec<ReleaseRef>> {
        Ok(DiscogsService::search_releases_by_track(self, artist, track, limit, ctx).await?)
    }

    async fn get_release(
        &self,
        release_id: i64,
        ctx: &RequestContext,
    ) -> anyhow::Result<Option<Release>> {
        Ok(DiscogsService::get_release(self, release_id, ctx).await?)
    }

    async fn search_releases(
        &self,
        query: &ReleaseQuery,
        limit: usize,
        ctx: &RequestContext,
    ) -> anyhow::Result<Vec<Artwork>> {
        Ok(self.search(query, limit, ctx).await?)
    }

    async fn validate_track_on_release(
        &self,
        release_id: i64,
        track: &str,
        artist: &str,
        ctx: &RequestContext,
    ) -> anyhow::Result<bool> {
        Ok(DiscogsService::validate_track_on_release(self, release_id, track, artist, ctx).await?)
    }

    async fn get_artist_image(
        &self,
        artist_id: i64,
        ctx: &RequestContext,
    ) -> anyhow::Result<Option<String>> {
        Ok(DiscogsService::get_artist_image(self, artist_id, ctx).await?)
    }

    async fn get_label_image(
        &self,
        label_id: i64,
        ctx: &RequestContext,
    ) -> anyhow::Result<Option<String>> {
        Ok(DiscogsService::get_label_image(self, label_id, ctx).await?)
    }
}
