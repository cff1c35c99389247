// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

/// Canonical URL of a release page at the external metadata provider.
#[must_use]
pub fn release_url(release_id: i64) -> String {
    format!("https://www.discogs.com/release/{release_id}")
}

/// A single track on an external release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub position: String,
    pub title: String,
    #[serde(default)]
    pub duration: Option<String>,
    /// Per-track artists, populated on multi-artist releases.
    #[serde(default)]
    pub artists: Vec<String>,
}

/// A release reference as returned by a track or free-text search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRef {
    pub release_id: i64,
    pub release_url: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub is_compilation: bool,
}

/// Full release metadata, identified by `release_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub release_id: i64,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub artist_id: Option<i64>,
    #[serde(default)]
    pub label_id: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub tracklist: Vec<Track>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    pub release_url: String,
    /// Whether this value was served from a cache tier instead of the
    /// upstream API.
    #[serde(default)]
    pub cached: bool,
}

impl Release {
    /// Whether the release's tracklist carries the given track by the
    /// given artist.
    ///
    /// Track titles match on normalized containment in either direction
    /// or a token-set score clearing the track threshold. Per-track
    /// artists are checked first (compilations); single-artist releases
    /// fall back to the release artist, with Discogs disambiguation
    /// suffixes like `(2)` stripped.
    #[must_use]
    pub fn contains_track(&self, track: &str, artist: &str) -> bool {
        use crate::{matching::normalize, scoring};

        fn artist_matches(candidate: &str, requested: &str) -> bool {
            let candidate = normalize(candidate.split('(').next().unwrap_or_default());
            let requested = normalize(requested);
            !candidate.is_empty()
                && !requested.is_empty()
                && (candidate.contains(&requested) || requested.contains(&candidate))
        }

        let track_normalized = normalize(track);
        self.tracklist.iter().any(|entry| {
            let entry_normalized = normalize(&entry.title);
            let title_ok = (!entry_normalized.is_empty()
                && !track_normalized.is_empty()
                && (entry_normalized.contains(&track_normalized)
                    || track_normalized.contains(&entry_normalized)))
                || scoring::token_set_ratio(&entry.title, track)
                    >= scoring::TRACK_TITLE_THRESHOLD;
            if !title_ok {
                return false;
            }
            if entry.artists.is_empty() {
                artist_matches(&self.artist, artist)
            } else {
                entry
                    .artists
                    .iter()
                    .any(|track_artist| artist_matches(track_artist, artist))
            }
        })
    }
}

/// An artwork-oriented search result with a match confidence.
///
/// `confidence` is derived from title/artist similarity to the
/// originating request and always lies in `[0.2, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    pub album: String,
    pub artist: String,
    pub release_id: i64,
    pub release_url: String,
    #[serde(default)]
    pub artwork_url: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release_with_tracks(artist: &str, tracks: Vec<Track>) -> Release {
        Release {
            release_id: 1,
            title: "Test".into(),
            artist: artist.into(),
            year: None,
            label: None,
            artist_id: None,
            label_id: None,
            genres: Vec::new(),
            styles: Vec::new(),
            tracklist: tracks,
            artwork_url: None,
            release_url: release_url(1),
            cached: false,
        }
    }

    fn track(title: &str, artists: &[&str]) -> Track {
        Track {
            position: String::new(),
            title: title.into(),
            duration: None,
            artists: artists.iter().map(|a| (*a).to_owned()).collect(),
        }
    }

    #[test]
    fn track_match_checks_release_artist() {
        let release = release_with_tracks("Stereolab", vec![track("Percolator", &[])]);
        assert!(release.contains_track("Percolator", "Stereolab"));
        assert!(!release.contains_track("Percolator", "Tortoise"));
        assert!(!release.contains_track("French Disko", "Stereolab"));
    }

    #[test]
    fn track_match_prefers_per_track_artists() {
        let release = release_with_tracks(
            "Various",
            vec![track("Sweet Love of Mine", &["Brown Sugar Inc"])],
        );
        assert!(release.contains_track("Sweet Love of Mine", "Brown Sugar Inc"));
        assert!(!release.contains_track("Sweet Love of Mine", "Someone Else"));
    }

    #[test]
    fn track_match_strips_disambiguation_suffix() {
        let release = release_with_tracks("Nirvana (2)", vec![track("Rainbow Chaser", &[])]);
        assert!(release.contains_track("Rainbow Chaser", "Nirvana"));
    }

    #[test]
    fn track_match_accepts_version_variants() {
        let release = release_with_tracks(
            "New Order",
            vec![track("Blue Monday (12\" Version)", &[])],
        );
        assert!(release.contains_track("Blue Monday", "New Order"));
    }
}
