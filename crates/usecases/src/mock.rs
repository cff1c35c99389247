// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory fakes of the service seams for pipeline tests.
//!
//! `MockLibrary` approximates the catalog cascade (token-AND match with
//! a fuzzy fallback); `MockMetadata` serves releases from a fixed list.

use std::collections::HashMap;

use async_trait::async_trait;

use euterpe_core::{
    library::LibraryItem,
    matching::{calculate_confidence, is_compilation_artist, normalize, tokenize},
    release::{Artwork, Release, ReleaseRef},
    scoring::{
        token_set_ratio, ARTIST_SIMILARITY_THRESHOLD, FUZZY_MATCH_THRESHOLD,
        TRACK_TITLE_THRESHOLD,
    },
    stats::RequestContext,
};

use crate::{
    ports::{LibraryStore, ReleaseMetadata, ReleaseQuery, SearchOptions},
    Result,
};

pub(crate) struct MockLibrary {
    items: Vec<LibraryItem>,
}

impl MockLibrary {
    pub(crate) fn new(items: Vec<LibraryItem>) -> Self {
        Self { items }
    }
}

fn item_haystack(item: &LibraryItem) -> (String, String) {
    (
        normalize(item.artist.as_deref().unwrap_or_default()),
        normalize(item.title.as_deref().unwrap_or_default()),
    )
}

#[async_trait]
impl LibraryStore for MockLibrary {
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<LibraryItem>> {
        let tokens = tokenize(query);
        let mut results: Vec<LibraryItem> = if tokens.is_empty() {
            Vec::new()
        } else {
            self.items
                .iter()
                .filter(|item| {
                    let (artist, title) = item_haystack(item);
                    tokens
                        .iter()
                        .all(|token| artist.contains(token) || title.contains(token))
                })
                .cloned()
                .collect()
        };

        if results.is_empty() && options.fallback_to_fuzzy {
            results = self
                .items
                .iter()
                .filter(|item| {
                    let (artist, title) = item_haystack(item);
                    token_set_ratio(query, &format!("{artist} {title}")) >= FUZZY_MATCH_THRESHOLD
                })
                .cloned()
                .collect();
        }

        if let Some(filter) = &options.artist_filter {
            let needle = normalize(filter);
            results.retain(|item| item_haystack(item).0.starts_with(&needle));
        }
        results.truncate(options.limit);
        Ok(results)
    }

    async fn find_similar_artist(&self, artist: &str) -> Result<Option<String>> {
        let mut best: Option<(u32, &str)> = None;
        for candidate in self.items.iter().filter_map(|item| item.artist.as_deref()) {
            let score = token_set_ratio(artist, candidate);
            if score >= ARTIST_SIMILARITY_THRESHOLD
                && best.map_or(true, |(best_score, _)| score > best_score)
            {
                best = Some((score, candidate));
            }
        }
        Ok(best.and_then(|(_, candidate)| {
            (candidate.to_lowercase() != artist.to_lowercase()).then(|| candidate.to_owned())
        }))
    }
}

pub(crate) struct MockMetadata {
    releases: Vec<Release>,
    pub(crate) artist_images: HashMap<i64, String>,
    pub(crate) label_images: HashMap<i64, String>,
}

impl MockMetadata {
    pub(crate) fn new(releases: Vec<Release>) -> Self {
        Self {
            releases,
            artist_images: HashMap::new(),
            label_images: HashMap::new(),
        }
    }
}

fn contains_either(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

fn artist_name_matches(candidate: &str, requested: &str) -> bool {
    // Strip Discogs disambiguation suffixes like "(2)".
    let candidate = candidate.split('(').next().unwrap_or_default().trim();
    contains_either(candidate, requested)
}

#[async_trait]
impl ReleaseMetadata for MockMetadata {
    async fn search_releases_by_track(
        &self,
        _artist: Option<&str>,
        track: &str,
        limit: usize,
        _ctx: &RequestContext,
    ) -> anyhow::Result<Vec<ReleaseRef>> {
        Ok(self
            .releases
            .iter()
            .filter(|release| {
                // The strict upstream query pins the exact track title.
                release
                    .tracklist
                    .iter()
                    .any(|t| normalize(&t.title) == normalize(track))
            })
            .take(limit)
            .map(|release| ReleaseRef {
                release_id: release.release_id,
                release_url: release.release_url.clone(),
                title: release.title.clone(),
                artist: release.artist.clone(),
                is_compilation: is_compilation_artist(&release.artist),
            })
            .collect())
    }

    async fn get_release(
        &self,
        release_id: i64,
        _ctx: &RequestContext,
    ) -> anyhow::Result<Option<Release>> {
        Ok(self
            .releases
            .iter()
            .find(|release| release.release_id == release_id)
            .cloned())
    }

    async fn search_releases(
        &self,
        query: &ReleaseQuery,
        limit: usize,
        _ctx: &RequestContext,
    ) -> anyhow::Result<Vec<Artwork>> {
        let album_query = query.album.as_deref().or(query.track.as_deref());
        if query.artist.is_none() && album_query.is_none() {
            return Ok(Vec::new());
        }
        Ok(self
            .releases
            .iter()
            .filter(|release| {
                let artist_ok = query
                    .artist
                    .as_deref()
                    .map_or(true, |artist| contains_either(&release.artist, artist));
                let album_ok =
                    album_query.map_or(true, |album| contains_either(&release.title, album));
                artist_ok && album_ok
            })
            .take(limit)
            .map(|release| Artwork {
                album: release.title.clone(),
                artist: release.artist.clone(),
                release_id: release.release_id,
                release_url: release.release_url.clone(),
                artwork_url: release.artwork_url.clone(),
                confidence: calculate_confidence(
                    query.artist.as_deref(),
                    album_query,
                    &release.artist,
                    &release.title,
                ),
                cached: false,
            })
            .collect())
    }

    async fn validate_track_on_release(
        &self,
        release_id: i64,
        track: &str,
        artist: &str,
        _ctx: &RequestContext,
    ) -> anyhow::Result<bool> {
        let Some(release) = self
            .releases
            .iter()
            .find(|release| release.release_id == release_id)
        else {
            return Ok(false);
        };
        Ok(release.tracklist.iter().any(|entry| {
            let title_ok = contains_either(&entry.title, track)
                || token_set_ratio(&entry.title, track) >= TRACK_TITLE_THRESHOLD;
            if !title_ok {
                return false;
            }
            if entry.artists.is_empty() {
                artist_name_matches(&release.artist, artist)
            } else {
                entry
                    .artists
                    .iter()
                    .any(|track_artist| artist_name_matches(track_artist, artist))
            }
        }))
    }

    async fn get_artist_image(
        &self,
        artist_id: i64,
        _ctx: &RequestContext,
    ) -> anyhow::Result<Option<String>> {
        Ok(self.artist_images.get(&artist_id).cloned())
    }

    async fn get_label_image(
        &self,
        label_id: i64,
        _ctx: &RequestContext,
    ) -> anyhow::Result<Option<String>> {
        Ok(self.label_images.get(&label_id).cloned())
    }
}
