// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The six-step lookup pipeline: artist correction, album resolution,
//! strategy pipeline, track validation, artwork fetch and context
//! message.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use futures::future::join_all;

use euterpe_core::{
    library::LibraryItem,
    lookup::{LookupRequest, LookupResponse, LookupResult, SearchType},
    matching::{is_compilation_artist, normalize},
    release::Artwork,
    stats::RequestContext,
};

use crate::{
    ports::{LibraryStore, ReleaseMetadata, ReleaseQuery},
    search::{limit_results, LookupEnv},
    state::SearchState,
    strategies::execute_pipeline,
    Error, Result,
};

/// Orchestrate a full lookup.
///
/// Only invalid input and an unavailable catalog fail the request; every
/// metadata-tier failure degrades to empty external data.
pub async fn perform_lookup(
    request: &LookupRequest,
    library: &dyn LibraryStore,
    metadata: Option<&dyn ReleaseMetadata>,
    ctx: &RequestContext,
) -> Result<LookupResponse> {
    if !request.has_searchable_fields() {
        return Err(Error::InvalidInput);
    }

    let total_started = Instant::now();
    let mut steps: Vec<(&'static str, Duration)> = Vec::new();
    let env = LookupEnv {
        library,
        metadata,
        ctx,
    };

    let mut working = request.clone();
    let mut state = SearchState::default();

    // Step 1: correct artist spelling against the catalog.
    let started = Instant::now();
    if let Some(artist) = working.artist.clone() {
        if let Some(corrected) = library.find_similar_artist(&artist).await? {
            log::info!("Corrected artist '{artist}' to '{corrected}'");
            state.corrected_artist = Some(corrected.clone());
            working.artist = Some(corrected);
        }
    }
    steps.push(("artist_correction", started.elapsed()));

    // Step 2: resolve album names from the metadata tier when only a
    // song was given (or the album field repeats the artist).
    let started = Instant::now();
    let album_is_artist = match (working.album.as_deref(), working.artist.as_deref()) {
        (Some(album), Some(artist)) => normalize(album) == normalize(artist),
        _ => false,
    };
    let album_missing = working
        .album
        .as_deref()
        .map_or(true, |album| album.trim().is_empty());
    if album_missing || album_is_artist {
        if album_is_artist {
            log::info!(
                "Album '{}' appears to be artist name, looking up albums",
                working.album.as_deref().unwrap_or_default()
            );
            working.album = None;
        }
        state.resolved_albums = resolve_albums_for_track(&env, &working).await;
    }
    steps.push(("album_lookup", started.elapsed()));

    // Step 3: the strategy pipeline.
    let started = Instant::now();
    execute_pipeline(&env, &working, &mut state).await?;
    state.results = limit_results(std::mem::take(&mut state.results));
    steps.push(("library_search", started.elapsed()));

    // Step 4: validate artist-only fallback results against tracklists.
    if state.song_not_found && !state.results.is_empty() {
        if let (Some(song), Some(artist)) = (working.song.clone(), working.artist.clone()) {
            let started = Instant::now();
            if let Some(validated) =
                validate_results(&env, &state.results, &state.external_titles, &song, &artist)
                    .await
            {
                log::info!(
                    "Track validation filtered {} albums to {} containing '{song}'",
                    state.results.len(),
                    validated.len()
                );
                state.results = validated;
                state.song_not_found = false;
            }
            steps.push(("track_validation", started.elapsed()));
        }
    }

    // Step 5: fetch artwork per item, in input order.
    let started = Instant::now();
    let artworks = fetch_artwork(&env, &state.results, &state.external_titles).await;
    steps.push(("artwork_fetch", started.elapsed()));

    // Step 6: context message.
    let has_results = !state.results.is_empty();
    let context_message = build_context_message(&working, &state, has_results);

    let timings: Vec<String> = steps
        .iter()
        .map(|(name, elapsed)| format!("{name}={}ms", elapsed.as_millis()))
        .collect();
    log::debug!(
        "Lookup completed in {}ms ({}), strategies tried: {:?}",
        total_started.elapsed().as_millis(),
        timings.join(" "),
        state
            .strategies_tried
            .iter()
            .map(|name| name.as_str())
            .collect::<Vec<_>>()
    );

    let results = state
        .results
        .into_iter()
        .zip(artworks)
        .map(|(library_item, artwork)| LookupResult {
            library_item,
            artwork,
        })
        .collect();

    Ok(LookupResponse {
        results,
        search_type: state.search_type,
        song_not_found: state.song_not_found,
        found_on_compilation: state.found_on_compilation,
        context_message,
        corrected_artist: state.corrected_artist,
        cache_stats: Some(ctx.stats.snapshot()),
    })
}

/// Resolve the albums carrying the requested track, keeping releases
/// whose artist starts with the requested artist and deduplicating
/// titles case-folded.
async fn resolve_albums_for_track(env: &LookupEnv<'_>, request: &LookupRequest) -> Vec<String> {
    let (Some(artist), Some(song)) = (request.artist.as_deref(), request.song.as_deref()) else {
        return Vec::new();
    };
    let Some(metadata) = env.metadata else {
        return Vec::new();
    };

    match metadata
        .search_releases_by_track(Some(artist), song, 10, env.ctx)
        .await
    {
        Ok(releases) => {
            let artist_normalized = normalize(artist);
            let mut albums: Vec<String> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            for release in releases {
                if !normalize(&release.artist).starts_with(&artist_normalized) {
                    continue;
                }
                if seen.insert(normalize(&release.title)) {
                    albums.push(release.title);
                }
            }
            if albums.is_empty() {
                log::info!("Could not find albums for song '{song}'");
            } else {
                log::info!("Found {} albums for song '{song}': {albums:?}", albums.len());
            }
            albums
        }
        Err(err) => {
            log::warn!("Track lookup failed: {err}");
            Vec::new()
        }
    }
}

/// Keep only items whose resolved release actually carries the requested
/// track. Returns `None` when nothing could be confirmed, leaving the
/// fallback results in place.
async fn validate_results(
    env: &LookupEnv<'_>,
    results: &[LibraryItem],
    external_titles: &HashMap<i64, String>,
    song: &str,
    artist: &str,
) -> Option<Vec<LibraryItem>> {
    let metadata = env.metadata?;

    let checks = results.iter().map(|item| {
        let album = external_titles
            .get(&item.id)
            .cloned()
            .or_else(|| item.title.clone());
        async move {
            let album = album?;
            let query = ReleaseQuery {
                artist: Some(artist.to_owned()),
                album: Some(album),
                track: None,
            };
            let found = metadata.search_releases(&query, 5, env.ctx).await.ok()?;
            let best = found.into_iter().next()?;
            let valid = metadata
                .validate_track_on_release(best.release_id, song, artist, env.ctx)
                .await
                .unwrap_or(false);
            if valid {
                log::info!(
                    "Track validation: '{song}' confirmed on '{}' (release {})",
                    item.title.as_deref().unwrap_or_default(),
                    best.release_id
                );
                Some(item.clone())
            } else {
                None
            }
        }
    });

    let validated: Vec<LibraryItem> = join_all(checks).await.into_iter().flatten().collect();
    if validated.is_empty() {
        log::info!("Track validation could not confirm '{song}' on any album");
        None
    } else {
        Some(validated)
    }
}

/// Fetch artwork for each item in parallel, gathered in input order.
/// Failures never drop an item, its artwork is simply absent.
async fn fetch_artwork(
    env: &LookupEnv<'_>,
    items: &[LibraryItem],
    external_titles: &HashMap<i64, String>,
) -> Vec<Option<Artwork>> {
    let Some(metadata) = env.metadata else {
        return vec![None; items.len()];
    };
    if items.is_empty() {
        return Vec::new();
    }

    let fetches = items.iter().map(|item| {
        let album = external_titles
            .get(&item.id)
            .cloned()
            .or_else(|| item.title.clone());
        async move {
            let album = album?;
            let mut artist = item.artist.clone().unwrap_or_default();
            if is_compilation_artist(&artist) {
                "Various".clone_into(&mut artist);
            }
            let query = ReleaseQuery {
                artist: (!artist.is_empty()).then_some(artist),
                album: Some(album),
                track: None,
            };
            let found = match metadata.search_releases(&query, 5, env.ctx).await {
                Ok(found) => found,
                Err(err) => {
                    log::warn!("Artwork lookup failed for {:?}: {err}", item.title);
                    return None;
                }
            };
            let mut artwork = found.into_iter().next()?;
            if artwork.artwork_url.is_none() {
                artwork.artwork_url =
                    resolve_fallback_artwork(metadata, env.ctx, artwork.release_id).await;
            }
            Some(artwork)
        }
    });

    join_all(fetches).await
}

/// Try the artist image, then the label image, for a release with no
/// cover art.
async fn resolve_fallback_artwork(
    metadata: &dyn ReleaseMetadata,
    ctx: &RequestContext,
    release_id: i64,
) -> Option<String> {
    let release = metadata.get_release(release_id, ctx).await.ok().flatten()?;

    if let Some(artist_id) = release.artist_id {
        if let Ok(Some(image)) = metadata.get_artist_image(artist_id, ctx).await {
            log::info!("Using artist image fallback for release {release_id}");
            return Some(image);
        }
    }
    if let Some(label_id) = release.label_id {
        if let Ok(Some(image)) = metadata.get_label_image(label_id, ctx).await {
            log::info!("Using label image fallback for release {release_id}");
            return Some(image);
        }
    }
    None
}

/// Human-readable summary of how the match was found. Purely
/// informational.
fn build_context_message(
    request: &LookupRequest,
    state: &SearchState,
    has_results: bool,
) -> Option<String> {
    let artist = request.artist.as_deref().unwrap_or_default();

    if state.found_on_compilation {
        let song = request.song.as_deref().unwrap_or_default();
        return Some(format!("Found \"{song}\" by {artist} on:"));
    }

    if state.song_not_found && has_results {
        if let Some(song) = request.song.as_deref() {
            if let Some(album) = request.album.as_deref() {
                return Some(format!(
                    "\"{album}\" not found in the library, but here are other albums by {artist}:"
                ));
            }
            return Some(format!(
                "\"{song}\" is not on any album in the library, but here are some albums by {artist}:"
            ));
        }
        return None;
    }
    if state.song_not_found && !has_results {
        if let Some(song) = request.song.as_deref() {
            if !artist.is_empty() {
                return Some(format!("\"{song}\" by {artist} not found in library."));
            }
        }
        return None;
    }

    if state.search_type == SearchType::Swapped && has_results {
        if let Some(first) = state.results.first() {
            return Some(format!(
                "Interpreted as {} by {} (swapped)",
                first.title.as_deref().unwrap_or_default(),
                first.artist.as_deref().unwrap_or_default()
            ));
        }
    }

    if let Some(corrected) = &state.corrected_artist {
        if has_results {
            return Some(format!("Corrected artist to {corrected}."));
        }
    }

    if !has_results {
        return Some("No matches found.".to_owned());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLibrary, MockMetadata};
    use euterpe_core::release::{Release, Track};

    fn item(id: i64, artist: &str, title: &str) -> LibraryItem {
        LibraryItem {
            id,
            artist: Some(artist.to_owned()),
            title: Some(title.to_owned()),
            call_letters: None,
            artist_call_number: None,
            release_call_number: None,
            genre: None,
            format: None,
        }
    }

    fn release(id: i64, artist: &str, title: &str, tracks: &[&str]) -> Release {
        Release {
            release_id: id,
            title: title.to_owned(),
            artist: artist.to_owned(),
            year: Some(1997),
            label: None,
            artist_id: None,
            label_id: None,
            genres: Vec::new(),
            styles: Vec::new(),
            tracklist: tracks
                .iter()
                .map(|t| Track {
                    position: String::new(),
                    title: (*t).to_owned(),
                    duration: None,
                    artists: Vec::new(),
                })
                .collect(),
            artwork_url: Some("https://img.example/cover.jpg".to_owned()),
            release_url: euterpe_core::release::release_url(id),
            cached: false,
        }
    }

    fn request(artist: Option<&str>, song: Option<&str>, album: Option<&str>) -> LookupRequest {
        LookupRequest {
            artist: artist.map(Into::into),
            song: song.map(Into::into),
            album: album.map(Into::into),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_request_without_searchable_fields() {
        let library = MockLibrary::new(Vec::new());
        let ctx = RequestContext::default();
        let result = perform_lookup(&LookupRequest::default(), &library, None, &ctx).await;
        assert!(matches!(result, Err(Error::InvalidInput)));
    }

    #[tokio::test]
    async fn direct_hit_via_resolved_album() {
        // {artist, song} resolves the album upstream and matches it in
        // the catalog directly.
        let library = MockLibrary::new(vec![item(1, "Stereolab", "Emperor Tomato Ketchup")]);
        let metadata = MockMetadata::new(vec![release(
            100,
            "Stereolab",
            "Emperor Tomato Ketchup",
            &["Metronomic Underground", "Percolator"],
        )]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("Stereolab"), Some("Percolator"), None),
            &library,
            Some(&metadata),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(
            response.results[0].library_item.title.as_deref(),
            Some("Emperor Tomato Ketchup")
        );
        assert_eq!(response.search_type, SearchType::Direct);
        assert!(!response.song_not_found);
        assert!(!response.found_on_compilation);
        assert!(response.results[0].artwork.is_some());
        assert!(response.cache_stats.is_some());
    }

    #[tokio::test]
    async fn misspelled_artist_is_corrected() {
        let library = MockLibrary::new(vec![item(
            1,
            "Lucinda Williams",
            "Car Wheels on a Gravel Road",
        )]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("lucinda willias"), None, Some("Car Wheels")),
            &library,
            None,
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(response.corrected_artist.as_deref(), Some("Lucinda Williams"));
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.search_type, SearchType::Direct);
        assert_eq!(
            response.context_message.as_deref(),
            Some("Corrected artist to Lucinda Williams.")
        );
    }

    #[tokio::test]
    async fn ambiguous_message_is_swapped() {
        let library = MockLibrary::new(vec![item(1, "Guerilla Toss", "Famously Alive")]);
        let ctx = RequestContext::default();
        let mut req = request(None, Some("Betty Dreams of Green Men"), None);
        req.raw_message = Some("Guerilla Toss - Betty Dreams of Green Men".to_owned());

        let response = perform_lookup(&req, &library, None, &ctx).await.unwrap();

        assert_eq!(response.search_type, SearchType::Swapped);
        assert_eq!(
            response.results[0].library_item.artist.as_deref(),
            Some("Guerilla Toss")
        );
    }

    #[tokio::test]
    async fn track_found_on_compilation() {
        let library = MockLibrary::new(vec![item(1, "Various", "Said I Had a Vision")]);
        let mut compilation = release(
            200,
            "Various",
            "Said I Had a Vision",
            &["Opening Theme", "Sweet Love of Mine"],
        );
        compilation.tracklist[1].artists = vec!["Brown Sugar Inc".to_owned()];
        let metadata = MockMetadata::new(vec![compilation]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("Brown Sugar Inc"), Some("Sweet Love of Mine"), None),
            &library,
            Some(&metadata),
            &ctx,
        )
        .await
        .unwrap();

        assert!(response.found_on_compilation);
        assert_eq!(response.search_type, SearchType::Compilation);
        assert_eq!(response.results.len(), 1);
        assert_eq!(
            response.results[0].library_item.title.as_deref(),
            Some("Said I Had a Vision")
        );
        assert_eq!(
            response.context_message.as_deref(),
            Some("Found \"Sweet Love of Mine\" by Brown Sugar Inc on:")
        );
    }

    #[tokio::test]
    async fn artist_fallback_upgrades_to_compilation() {
        // The artist-only fallback finds the artist's other albums, then
        // the compilation strategy replaces them with the release that
        // actually carries the track.
        let library = MockLibrary::new(vec![
            item(1, "Brown Sugar Inc", "Greatest Hits"),
            item(2, "Various", "Said I Had a Vision"),
        ]);
        let mut compilation = release(
            200,
            "Various",
            "Said I Had a Vision",
            &["Sweet Love of Mine"],
        );
        compilation.tracklist[0].artists = vec!["Brown Sugar Inc".to_owned()];
        let metadata = MockMetadata::new(vec![compilation]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("Brown Sugar Inc"), Some("Sweet Love of Mine"), None),
            &library,
            Some(&metadata),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(response.search_type, SearchType::Compilation);
        assert!(response.found_on_compilation);
        assert!(!response.song_not_found);
        let titles: Vec<_> = response
            .results
            .iter()
            .map(|r| r.library_item.title.as_deref().unwrap())
            .collect();
        assert_eq!(titles, ["Said I Had a Vision"]);
    }

    #[tokio::test]
    async fn song_treated_as_artist() {
        let library = MockLibrary::new(vec![item(1, "Deee-Lite", "World Clique")]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(None, Some("Deee-Lite"), None),
            &library,
            None,
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(response.search_type, SearchType::SongAsArtist);
        assert_eq!(
            response.results[0].library_item.artist.as_deref(),
            Some("Deee-Lite")
        );
    }

    #[tokio::test]
    async fn diacritics_fold_to_a_direct_match() {
        let library = MockLibrary::new(vec![item(1, "Jørgen Plaetner", "Electronic Music")]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("Jorgen Plaetner"), None, None),
            &library,
            None,
            &ctx,
        )
        .await
        .unwrap();

        assert!(!response.results.is_empty());
        assert_eq!(response.search_type, SearchType::Direct);
    }

    #[tokio::test]
    async fn empty_outcome_is_still_a_success() {
        let library = MockLibrary::new(vec![item(1, "Stereolab", "Dots and Loops")]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("Nonexistent Band"), None, None),
            &library,
            None,
            &ctx,
        )
        .await
        .unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.search_type, SearchType::None);
        assert_eq!(response.context_message.as_deref(), Some("No matches found."));
    }

    #[tokio::test]
    async fn fallback_results_survive_failed_validation() {
        // Artist-only fallback results stay in place when no tracklist
        // confirms the song; song_not_found remains set.
        let library = MockLibrary::new(vec![item(1, "Stereolab", "Dots and Loops")]);
        let metadata = MockMetadata::new(vec![release(
            300,
            "Stereolab",
            "Dots and Loops",
            &["Brakhage", "Miss Modular"],
        )]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("Stereolab"), Some("Not A Real Song"), None),
            &library,
            Some(&metadata),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 1);
        assert!(response.song_not_found);
        assert_eq!(response.search_type, SearchType::Direct);
        assert_eq!(
            response.context_message.as_deref(),
            Some(
                "\"Not A Real Song\" is not on any album in the library, \
                 but here are some albums by Stereolab:"
            )
        );
    }

    #[tokio::test]
    async fn validation_narrows_fallback_results() {
        // The artist-only fallback surfaces both of the artist's albums;
        // the tracklist validation pass keeps only the one carrying a
        // variant of the requested song and clears song_not_found.
        let library = MockLibrary::new(vec![
            item(1, "Stereolab", "Dots and Loops"),
            item(2, "Stereolab", "Aluminum Tunes"),
        ]);
        let metadata = MockMetadata::new(vec![
            release(301, "Stereolab", "Dots and Loops", &["Brakhage"]),
            release(
                302,
                "Stereolab",
                "Aluminum Tunes",
                &["Miss Modular (Alternate Take)"],
            ),
        ]);
        let ctx = RequestContext::default();

        let response = perform_lookup(
            &request(Some("Stereolab"), Some("Miss Modular"), None),
            &library,
            Some(&metadata),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(
            response.results[0].library_item.title.as_deref(),
            Some("Aluminum Tunes")
        );
        assert!(!response.song_not_found);
        assert!(!response.found_on_compilation);
        assert_eq!(response.search_type, SearchType::Direct);
    }
}
