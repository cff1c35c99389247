// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::HashMap;

use euterpe_core::{library::LibraryItem, lookup::SearchType};

/// Identifies a strategy in telemetry and in `strategies_tried`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyName {
    ArtistPlusAlbum,
    SwappedInterpretation,
    TrackOnCompilation,
    SongAsArtist,
}

impl StrategyName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArtistPlusAlbum => "artist_plus_album",
            Self::SwappedInterpretation => "swapped_interpretation",
            Self::TrackOnCompilation => "track_on_compilation",
            Self::SongAsArtist => "song_as_artist",
        }
    }
}

/// Accumulator threaded through the strategy pipeline.
///
/// Invariants: `results` non-empty implies `search_type != None`;
/// `found_on_compilation` implies the compilation strategy ran and
/// succeeded.
#[derive(Debug, Default)]
pub struct SearchState {
    pub results: Vec<LibraryItem>,
    /// Set when results were produced only via an artist-only fallback,
    /// i.e. the requested song/album itself was not confirmed.
    pub song_not_found: bool,
    pub found_on_compilation: bool,
    pub search_type: SearchType,
    pub strategies_tried: Vec<StrategyName>,
    /// Canonical release title per library item id, used by artwork
    /// lookup when the catalog title diverges from the external name.
    pub external_titles: HashMap<i64, String>,
    /// Album names discovered from track-to-release resolution.
    pub resolved_albums: Vec<String>,
    pub corrected_artist: Option<String>,
}
