// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Service seams of the lookup pipeline.
//!
//! The orchestrator only sees these traits; the diesel-backed catalog
//! store and the tiered Discogs service implement them in their own
//! crates, and tests substitute in-memory fakes.

use async_trait::async_trait;

use euterpe_core::{
    library::LibraryItem,
    matching::MAX_SEARCH_RESULTS,
    release::{Artwork, Release, ReleaseRef},
    stats::RequestContext,
};

use crate::Result;

/// Options for a catalog search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
    /// Fall through to the token-AND substring level when the full-text
    /// level yields nothing.
    pub fallback_to_like: bool,
    /// Fall through to fuzzy token-set scoring when the substring level
    /// yields nothing.
    pub fallback_to_fuzzy: bool,
    /// Keep only items whose artist starts with this name (diacritics
    /// folded, case insensitive).
    pub artist_filter: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: MAX_SEARCH_RESULTS,
            fallback_to_like: true,
            fallback_to_fuzzy: true,
            artist_filter: None,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn with_artist_filter(mut self, artist: Option<String>) -> Self {
        self.artist_filter = artist;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// The station's catalog of albums.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Three-level search cascade over the catalog.
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<LibraryItem>>;

    /// Fuzzy-correct an artist name against the catalog. Returns the
    /// corrected name only when it differs from the input.
    async fn find_similar_artist(&self, artist: &str) -> Result<Option<String>>;
}

/// A free-text release query against the metadata tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseQuery {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
}

/// The external release metadata tier (cached Discogs).
///
/// All operations degrade: callers treat errors as empty external data,
/// never as a failed lookup.
#[async_trait]
pub trait ReleaseMetadata: Send + Sync {
    /// All releases containing the given track.
    async fn search_releases_by_track(
        &self,
        artist: Option<&str>,
        track: &str,
        limit: usize,
        ctx: &RequestContext,
    ) -> anyhow::Result<Vec<ReleaseRef>>;

    /// Full release metadata by id.
    async fn get_release(
        &self,
        release_id: i64,
        ctx: &RequestContext,
    ) -> anyhow::Result<Option<Release>>;

    /// Artwork-oriented release search, ranked by confidence.
    async fn search_releases(
        &self,
        query: &ReleaseQuery,
        limit: usize,
        ctx: &RequestContext,
    ) -> anyhow::Result<Vec<Artwork>>;

    /// Whether the given track by the given artist appears on the
    /// release's tracklist.
    async fn validate_track_on_release(
        &self,
        release_id: i64,
        track: &str,
        artist: &str,
        ctx: &RequestContext,
    ) -> anyhow::Result<bool>;

    /// Primary image of an artist, used as artwork fallback.
    async fn get_artist_image(
        &self,
        artist_id: i64,
        ctx: &RequestContext,
    ) -> anyhow::Result<Option<String>>;

    /// Primary image of a label, used as artwork fallback.
    async fn get_label_image(
        &self,
        label_id: i64,
        ctx: &RequestContext,
    ) -> anyhow::Result<Option<String>>;
}
