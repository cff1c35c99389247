// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The declarative strategy pipeline.
//!
//! Strategies run in declaration order over a shared [`SearchState`].
//! Each has a pure trigger condition and an effectful execute step; the
//! executor stops at the first strategy that produced confirmed results,
//! but keeps going past artist-only fallback results so the compilation
//! strategy gets a chance to upgrade them.

use euterpe_core::{
    lookup::{LookupRequest, SearchType},
    matching::detect_ambiguous_format,
};

use crate::{
    search::{
        search_compilations, search_song_as_artist, search_swapped, search_with_fallback,
        LookupEnv,
    },
    state::{SearchState, StrategyName},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Search by artist plus album/song, falling back to artist-only.
    ArtistPlusAlbum,
    /// Try an ambiguous `X - Y` request in both artist/title orderings.
    SwappedInterpretation,
    /// Find the track on other releases via the metadata tier.
    TrackOnCompilation,
    /// Treat the parsed song as an artist name.
    SongAsArtist,
}

impl Strategy {
    /// Declaration order of the pipeline.
    pub const ALL: [Strategy; 4] = [
        Strategy::ArtistPlusAlbum,
        Strategy::SwappedInterpretation,
        Strategy::TrackOnCompilation,
        Strategy::SongAsArtist,
    ];

    #[must_use]
    pub fn name(self) -> StrategyName {
        match self {
            Self::ArtistPlusAlbum => StrategyName::ArtistPlusAlbum,
            Self::SwappedInterpretation => StrategyName::SwappedInterpretation,
            Self::TrackOnCompilation => StrategyName::TrackOnCompilation,
            Self::SongAsArtist => StrategyName::SongAsArtist,
        }
    }

    /// Pure trigger condition; never performs I/O.
    #[must_use]
    pub fn condition(self, request: &LookupRequest, state: &SearchState) -> bool {
        match self {
            Self::ArtistPlusAlbum => {
                request.artist.is_some()
                    || !state.resolved_albums.is_empty()
                    || request.album.is_some()
                    || request.song.is_some()
            }
            Self::SwappedInterpretation => {
                state.results.is_empty()
                    && detect_ambiguous_format(request.raw_message()).is_some()
            }
            Self::TrackOnCompilation => {
                request.artist.is_some()
                    && request.song.is_some()
                    && (state.results.is_empty() || state.song_not_found)
            }
            Self::SongAsArtist => {
                state.results.is_empty() && request.song.is_some() && request.artist.is_none()
            }
        }
    }

    async fn execute(
        self,
        env: &LookupEnv<'_>,
        request: &LookupRequest,
        state: &mut SearchState,
    ) -> Result<()> {
        match self {
            Self::ArtistPlusAlbum => {
                let albums = if state.resolved_albums.is_empty() {
                    request.album.iter().cloned().collect::<Vec<_>>()
                } else {
                    state.resolved_albums.clone()
                };
                let (results, fallback_used) = search_with_fallback(env, request, &albums).await?;
                if !results.is_empty() {
                    state.results = results;
                    state.search_type = SearchType::Direct;
                }
                if fallback_used {
                    state.song_not_found = true;
                }
            }
            Self::SwappedInterpretation => {
                let Some((part1, part2)) = detect_ambiguous_format(request.raw_message()) else {
                    return Ok(());
                };
                let results = search_swapped(env, &part1, &part2).await?;
                if !results.is_empty() {
                    state.results = results;
                    state.song_not_found = false;
                    state.search_type = SearchType::Swapped;
                }
            }
            Self::TrackOnCompilation => {
                let (results, external_titles) = search_compilations(env, request).await?;
                if !results.is_empty() {
                    state.results = results;
                    state.song_not_found = false;
                    state.found_on_compilation = true;
                    state.search_type = SearchType::Compilation;
                    state.external_titles = external_titles;
                }
            }
            Self::SongAsArtist => {
                let Some(song) = &request.song else {
                    return Ok(());
                };
                let results = search_song_as_artist(env, song).await?;
                if !results.is_empty() {
                    state.results = results;
                    state.song_not_found = false;
                    state.search_type = SearchType::SongAsArtist;
                }
            }
        }
        Ok(())
    }
}

/// Run the strategies in declaration order until one produces confirmed
/// results.
///
/// Results that came in via an artist-only fallback (`song_not_found`)
/// do not stop the pipeline: a later strategy may replace them with a
/// release that actually carries the requested track.
pub async fn execute_pipeline(
    env: &LookupEnv<'_>,
    request: &LookupRequest,
    state: &mut SearchState,
) -> Result<()> {
    for strategy in Strategy::ALL {
        if !strategy.condition(request, state) {
            continue;
        }
        state.strategies_tried.push(strategy.name());
        log::debug!("Running search strategy {}", strategy.name().as_str());
        strategy.execute(env, request, state).await?;

        if !state.results.is_empty() && !state.song_not_found {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(artist: Option<&str>, song: Option<&str>, album: Option<&str>) -> LookupRequest {
        LookupRequest {
            artist: artist.map(Into::into),
            song: song.map(Into::into),
            album: album.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn artist_plus_album_fires_on_any_field() {
        let state = SearchState::default();
        assert!(Strategy::ArtistPlusAlbum.condition(&request(Some("a"), None, None), &state));
        assert!(Strategy::ArtistPlusAlbum.condition(&request(None, Some("s"), None), &state));
        assert!(Strategy::ArtistPlusAlbum.condition(&request(None, None, Some("b")), &state));
        assert!(!Strategy::ArtistPlusAlbum.condition(&request(None, None, None), &state));
    }

    #[test]
    fn swapped_requires_empty_results_and_ambiguous_format() {
        let mut req = request(None, Some("s"), None);
        req.raw_message = Some("Laid Back - White Horse".into());
        let mut state = SearchState::default();
        assert!(Strategy::SwappedInterpretation.condition(&req, &state));

        state.results.push(euterpe_core::library::LibraryItem {
            id: 1,
            artist: None,
            title: None,
            call_letters: None,
            artist_call_number: None,
            release_call_number: None,
            genre: None,
            format: None,
        });
        assert!(!Strategy::SwappedInterpretation.condition(&req, &state));
    }

    #[test]
    fn compilation_fires_on_empty_results_or_fallback() {
        let req = request(Some("a"), Some("s"), None);
        let mut state = SearchState::default();
        assert!(Strategy::TrackOnCompilation.condition(&req, &state));

        state.song_not_found = true;
        assert!(Strategy::TrackOnCompilation.condition(&req, &state));

        // Confirmed results, nothing to upgrade.
        state.song_not_found = false;
        state.results.push(euterpe_core::library::LibraryItem {
            id: 1,
            artist: None,
            title: None,
            call_letters: None,
            artist_call_number: None,
            release_call_number: None,
            genre: None,
            format: None,
        });
        assert!(!Strategy::TrackOnCompilation.condition(&req, &state));
    }

    #[test]
    fn song_as_artist_requires_song_without_artist() {
        let state = SearchState::default();
        assert!(Strategy::SongAsArtist.condition(&request(None, Some("s"), None), &state));
        assert!(!Strategy::SongAsArtist.condition(&request(Some("a"), Some("s"), None), &state));
        assert!(!Strategy::SongAsArtist.condition(&request(None, None, None), &state));
    }
}
