// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::{library::LibraryItem, release::Artwork, stats::CacheStats};

/// An inbound lookup request with fields already extracted by the
/// upstream message parser. Missing fields are absent, not empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub raw_message: Option<String>,
    #[serde(default, skip_serializing)]
    pub skip_cache: bool,
}

impl LookupRequest {
    /// At least one of artist/song/album must be present for the request
    /// to be searchable.
    #[must_use]
    pub fn has_searchable_fields(&self) -> bool {
        fn present(field: &Option<String>) -> bool {
            field.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        present(&self.artist) || present(&self.song) || present(&self.album)
    }

    #[must_use]
    pub fn raw_message(&self) -> &str {
        self.raw_message.as_deref().unwrap_or_default()
    }
}

/// Which search mechanism produced the final results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Direct,
    Swapped,
    Compilation,
    SongAsArtist,
    #[default]
    None,
}

/// A library item paired with the artwork found for it, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub library_item: LibraryItem,
    #[serde(default)]
    pub artwork: Option<Artwork>,
}

/// The outcome of a lookup: ranked catalog items plus context describing
/// how the match was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub results: Vec<LookupResult>,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub song_not_found: bool,
    #[serde(default)]
    pub found_on_compilation: bool,
    #[serde(default)]
    pub context_message: Option<String>,
    #[serde(default)]
    pub corrected_artist: Option<String>,
    #[serde(default)]
    pub cache_stats: Option<CacheStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searchable_fields_require_nonempty_value() {
        let mut request = LookupRequest::default();
        assert!(!request.has_searchable_fields());
        request.artist = Some("  ".into());
        assert!(!request.has_searchable_fields());
        request.song = Some("Percolator".into());
        assert!(request.has_searchable_fields());
    }

    #[test]
    fn search_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SearchType::SongAsArtist).unwrap(),
            "\"song_as_artist\""
        );
        assert_eq!(serde_json::to_string(&SearchType::None).unwrap(), "\"none\"");
    }

    #[test]
    fn request_deserializes_with_missing_fields() {
        let request: LookupRequest =
            serde_json::from_str(r#"{"artist": "Stereolab", "raw_message": "play Stereolab"}"#)
                .unwrap();
        assert_eq!(request.artist.as_deref(), Some("Stereolab"));
        assert_eq!(request.song, None);
        assert!(!request.skip_cache);
    }
}
