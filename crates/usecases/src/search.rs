// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The search operations behind the strategies: catalog searches with
//! artist filtering, the compilation cross-reference and the
//! song-as-artist recovery.

use std::collections::{HashMap, HashSet};

use euterpe_core::{
    library::LibraryItem,
    lookup::LookupRequest,
    matching::{is_compilation_artist, normalize, tokenize, MAX_SEARCH_RESULTS},
    scoring::token_set_ratio,
    stats::RequestContext,
};

use crate::{
    ports::{LibraryStore, ReleaseMetadata, ReleaseQuery, SearchOptions},
    Result,
};

/// The service handles shared by all search operations of one request.
#[allow(missing_debug_implementations)]
pub struct LookupEnv<'a> {
    pub library: &'a dyn LibraryStore,
    pub metadata: Option<&'a dyn ReleaseMetadata>,
    pub ctx: &'a RequestContext,
}

pub(crate) fn limit_results(mut results: Vec<LibraryItem>) -> Vec<LibraryItem> {
    results.truncate(MAX_SEARCH_RESULTS);
    results
}

/// Whether the item's artist starts with the searched artist name,
/// diacritics folded and case insensitive.
pub(crate) fn artist_matches_item(item: &LibraryItem, artist: &str) -> bool {
    let needle = normalize(artist);
    if needle.is_empty() {
        return false;
    }
    item.artist
        .as_deref()
        .map(normalize)
        .is_some_and(|a| a.starts_with(&needle))
}

pub(crate) fn filter_results_by_artist(
    results: Vec<LibraryItem>,
    artist: Option<&str>,
) -> Vec<LibraryItem> {
    let Some(artist) = artist else {
        return results;
    };
    let before = results.len();
    let filtered: Vec<_> = results
        .into_iter()
        .filter(|item| artist_matches_item(item, artist))
        .collect();
    if filtered.len() < before {
        log::info!(
            "Filtered {before} results to {} matching artist '{artist}'",
            filtered.len()
        );
    }
    filtered
}

/// Stable sort placing items whose title contains `needle` first.
pub(crate) fn sort_by_title_substring(results: &mut [LibraryItem], needle: &str) {
    let needle = normalize(needle);
    results.sort_by_key(|item| {
        let contains = item
            .title
            .as_deref()
            .is_some_and(|title| normalize(title).contains(&needle));
        !contains
    });
}

fn item_artist(item: &LibraryItem) -> &str {
    item.artist.as_deref().unwrap_or_default()
}

fn significant_words(text: &str, min_len: usize) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|word| word.len() > min_len)
        .collect()
}

/// Keep only results whose title plausibly names the searched album:
/// short titles must prefix the album query, longer ones must share at
/// least two significant words with it.
fn filter_by_album_words(results: Vec<LibraryItem>, album: &str) -> Vec<LibraryItem> {
    let album_normalized = normalize(album);
    let album_words: HashSet<String> = significant_words(album, 2).into_iter().collect();
    results
        .into_iter()
        .filter(|item| {
            let title = item.title.as_deref().unwrap_or_default();
            let title_normalized = normalize(title);
            let title_words: HashSet<String> = significant_words(title, 2).into_iter().collect();
            if title_words.len() <= 2 {
                album_normalized.starts_with(&title_normalized)
            } else {
                album_words.intersection(&title_words).count() >= 2
            }
        })
        .collect()
}

/// Artist+album search with fallback to artist+song and artist-only.
///
/// The second value is true when results were produced by a fallback
/// level, i.e. the requested song/album itself was not confirmed.
pub(crate) async fn search_with_fallback(
    env: &LookupEnv<'_>,
    request: &LookupRequest,
    albums: &[String],
) -> Result<(Vec<LibraryItem>, bool)> {
    let mut all_results: Vec<LibraryItem> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();

    if request.artist.is_some() && !albums.is_empty() {
        for album in albums {
            let options = SearchOptions::default().with_artist_filter(request.artist.clone());
            let results = env.library.search(album, options).await?;
            let results = filter_by_album_words(results, album);
            for item in results {
                if seen.insert(item.id) {
                    all_results.push(item);
                }
            }
        }
        if !all_results.is_empty() {
            sort_by_title_substring(&mut all_results, &albums[0]);
            return Ok((all_results, false));
        }
    }

    if let (Some(artist), Some(song)) = (&request.artist, &request.song) {
        let options = SearchOptions::default().with_artist_filter(Some(artist.clone()));
        let mut results = env.library.search(song, options).await?;
        if !results.is_empty() {
            sort_by_title_substring(&mut results, song);
            return Ok((results, true));
        }
    }

    if let Some(artist) = &request.artist {
        log::info!("No results for albums {albums:?}, trying artist only: '{artist}'");
        let options = SearchOptions::default().with_artist_filter(Some(artist.clone()));
        let results = env.library.search(artist, options).await?;
        if !results.is_empty() {
            return Ok((results, true));
        }
    }

    Ok((Vec::new(), false))
}

async fn search_interpretation(
    env: &LookupEnv<'_>,
    artist_part: &str,
    title_part: &str,
) -> Result<Vec<LibraryItem>> {
    let combined = format!("{artist_part} {title_part}");
    let results = env.library.search(&combined, SearchOptions::default()).await?;
    let results = filter_results_by_artist(results, Some(artist_part));
    if !results.is_empty() {
        return Ok(results);
    }
    // The title side may name a track, which an album catalog cannot
    // match directly; retry with the artist side alone.
    let options = SearchOptions::default().with_artist_filter(Some(artist_part.to_owned()));
    env.library.search(artist_part, options).await
}

/// Try both artist/title interpretations of an ambiguous `X - Y`
/// request.
pub(crate) async fn search_swapped(
    env: &LookupEnv<'_>,
    part1: &str,
    part2: &str,
) -> Result<Vec<LibraryItem>> {
    let results1 = search_interpretation(env, part1, part2).await?;
    let results2 = search_interpretation(env, part2, part1).await?;

    match (results1.is_empty(), results2.is_empty()) {
        (false, true) => {
            log::info!("Alternative search matched with '{part1}' as artist");
            Ok(results1)
        }
        (true, false) => {
            log::info!("Alternative search matched with '{part2}' as artist");
            Ok(results2)
        }
        (false, false) => {
            log::info!("Alternative search matched both interpretations, combining results");
            let mut seen = HashSet::new();
            let mut combined = Vec::new();
            for item in results1.into_iter().chain(results2) {
                if seen.insert(item.id) {
                    combined.push(item);
                }
            }
            Ok(limit_results(combined))
        }
        (true, true) => Ok(Vec::new()),
    }
}

/// Search for an album title, retrying with its significant words and a
/// token-set similarity cut when the literal title finds nothing.
pub(crate) async fn search_album_fuzzy(
    env: &LookupEnv<'_>,
    album_title: &str,
) -> Result<Vec<LibraryItem>> {
    let results = env.library.search(album_title, SearchOptions::default()).await?;
    if !results.is_empty() {
        return Ok(results);
    }

    let significant = significant_words(album_title, 3);
    if significant.is_empty() {
        return Ok(Vec::new());
    }
    let fuzzy_query = significant[..significant.len().min(4)].join(" ");
    log::info!("Exact match failed for '{album_title}', trying fuzzy: '{fuzzy_query}'");
    let results = env.library.search(&fuzzy_query, SearchOptions::default()).await?;

    Ok(results
        .into_iter()
        .filter(|item| {
            let title = item.title.as_deref().unwrap_or_default();
            let title_normalized = normalize(title);
            let keyword_hits = significant
                .iter()
                .filter(|word| title_normalized.contains(word.as_str()))
                .count();
            keyword_hits >= 2 && token_set_ratio(album_title, title) >= 60
        })
        .collect())
}

/// Catalog search over the significant words of artist and song, kept as
/// a last resort when the external cross-reference finds nothing.
async fn keyword_search(
    env: &LookupEnv<'_>,
    artist: &str,
    song: &str,
) -> Result<Vec<LibraryItem>> {
    let mut query_words = significant_words(artist, 3);
    query_words.truncate(2);
    let mut song_words = significant_words(song, 3);
    song_words.truncate(2);
    query_words.append(&mut song_words);
    if query_words.is_empty() {
        return Ok(Vec::new());
    }

    let keyword_query = query_words.join(" ");
    log::info!("Trying direct keyword search: '{keyword_query}'");
    let results = env.library.search(&keyword_query, SearchOptions::default()).await?;
    Ok(results
        .into_iter()
        .filter(|item| {
            artist_matches_item(item, artist) || is_compilation_artist(item_artist(item))
        })
        .collect())
}

/// Use the full track name including version info when the raw message
/// carries a parenthesized remix/version suffix.
fn extend_song_with_version(song: &str, raw_message: &str) -> String {
    const VERSION_KEYWORDS: &[&str] = &["remix", "mix", "version", "edit"];

    let raw = raw_message.to_lowercase();
    if !raw.contains(&song.to_lowercase()) {
        return song.to_owned();
    }
    let mut rest = raw.as_str();
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        let inner = &rest[open + 1..open + close];
        if VERSION_KEYWORDS.iter().any(|kw| inner.contains(kw)) {
            log::info!("Using full track name with version info: '{song} ({inner})'");
            return format!("{song} ({inner})");
        }
        rest = &rest[open + close + 1..];
    }
    song.to_owned()
}

/// Find the requested track on other releases (compilations etc.) via
/// the external metadata tier, mapping matched releases back onto the
/// catalog.
///
/// Returns the matched items plus the canonical external release title
/// per item id.
pub(crate) async fn search_compilations(
    env: &LookupEnv<'_>,
    request: &LookupRequest,
) -> Result<(Vec<LibraryItem>, HashMap<i64, String>)> {
    let (Some(artist), Some(song)) = (request.artist.as_deref(), request.song.as_deref()) else {
        return Ok((Vec::new(), HashMap::new()));
    };
    let Some(metadata) = env.metadata else {
        return Ok((Vec::new(), HashMap::new()));
    };

    log::info!("Searching for '{song}' on other releases (compilations, etc.)");

    let keyword_matches = keyword_search(env, artist, song).await?;

    let mut results: Vec<LibraryItem> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut external_titles: HashMap<i64, String> = HashMap::new();

    let song_search = extend_song_with_version(song, request.raw_message());
    match metadata
        .search_releases_by_track(Some(artist), &song_search, 20, env.ctx)
        .await
    {
        Ok(releases) => {
            log::info!("Found {} releases with '{song_search}' upstream", releases.len());
            for release in releases {
                let release_title = release.title.trim();
                if release_title.len() < 3 {
                    continue;
                }
                if normalize(release_title) == normalize(artist) {
                    log::debug!("Skipping '{release_title}' - appears to be artist name");
                    continue;
                }

                let eligible = release.is_compilation
                    || metadata
                        .validate_track_on_release(release.release_id, song, artist, env.ctx)
                        .await
                        .unwrap_or_else(|err| {
                            log::warn!("Track validation failed for '{release_title}': {err}");
                            false
                        });
                if !eligible {
                    continue;
                }

                let matches = search_album_fuzzy(env, &release.title).await?;
                let matches: Vec<_> = matches
                    .into_iter()
                    .filter(|item| {
                        artist_matches_item(item, artist)
                            || (release.is_compilation
                                && is_compilation_artist(item_artist(item)))
                    })
                    .collect();

                if let Some(first) = matches.first() {
                    log::info!(
                        "Found '{song}' in library on '{}' (matched from '{release_title}')",
                        first.title.as_deref().unwrap_or_default()
                    );
                }
                for item in matches {
                    if seen.insert(item.id) {
                        external_titles.insert(item.id, release.title.clone());
                        results.push(item);
                    }
                }
                if results.len() >= MAX_SEARCH_RESULTS {
                    break;
                }
            }
        }
        Err(err) => {
            log::warn!("Failed to search for track on other releases: {err}");
        }
    }

    if results.is_empty() {
        if let Some(item) = keyword_matches.into_iter().next() {
            log::info!("External search found nothing, using keyword match as fallback");
            seen.insert(item.id);
            results.push(item);
        }
    }

    sort_by_title_substring(&mut results, song);
    Ok((limit_results(results), external_titles))
}

/// Treat the parsed song title as an artist name, cross-referencing the
/// metadata tier for that artist's releases when the catalog has no
/// direct match.
pub(crate) async fn search_song_as_artist(
    env: &LookupEnv<'_>,
    song_as_artist: &str,
) -> Result<Vec<LibraryItem>> {
    log::info!("Trying song '{song_as_artist}' as artist name");

    let results = env.library.search(song_as_artist, SearchOptions::default()).await?;
    let mut results = filter_results_by_artist(results, Some(song_as_artist));
    if !results.is_empty() {
        return Ok(limit_results(results));
    }

    let Some(metadata) = env.metadata else {
        return Ok(results);
    };
    let query = ReleaseQuery {
        artist: Some(song_as_artist.to_owned()),
        ..Default::default()
    };
    let releases = match metadata.search_releases(&query, 10, env.ctx).await {
        Ok(releases) => releases,
        Err(err) => {
            log::warn!("Release search for '{song_as_artist}' failed: {err}");
            return Ok(results);
        }
    };

    let mut seen: HashSet<i64> = HashSet::new();
    for release in releases {
        if release.album.is_empty() {
            continue;
        }
        let album_results = env.library.search(&release.album, SearchOptions::default()).await?;
        for item in album_results {
            if seen.contains(&item.id) {
                continue;
            }
            if artist_matches_item(&item, song_as_artist)
                || is_compilation_artist(item_artist(&item))
            {
                seen.insert(item.id);
                results.push(item);
            }
        }
        if results.len() >= MAX_SEARCH_RESULTS {
            break;
        }
    }

    if !results.is_empty() {
        log::info!(
            "Found {} results via external cross-reference for '{song_as_artist}'",
            results.len()
        );
    }
    Ok(limit_results(results))
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn artist_match_is_prefix_and_fold_insensitive() {
        let entry = item(1, "Jørgen Plaetner", "Electronic Music");
        assert!(artist_matches_item(&entry, "jorgen plaetner"));
        assert!(artist_matches_item(&entry, "Jørgen"));
        assert!(!artist_matches_item(&entry, "Plaetner"));
        assert!(!artist_matches_item(&entry, ""));
    }

    #[test]
    fn title_substring_sort_is_stable() {
        let mut results = vec![
            item(1, "a", "Other Album"),
            item(2, "a", "Car Wheels on a Gravel Road"),
            item(3, "a", "Another"),
        ];
        sort_by_title_substring(&mut results, "Car Wheels");
        assert_eq!(results[0].id, 2);
        assert_eq!(results[1].id, 1);
        assert_eq!(results[2].id, 3);
    }

    #[test]
    fn album_word_filter_requires_overlap() {
        let results = vec![
            item(1, "Lucinda Williams", "Car Wheels on a Gravel Road"),
            item(2, "Lucinda Williams", "Essence"),
        ];
        let filtered = filter_by_album_words(results, "Car Wheels");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 1);
    }

    #[test]
    fn album_word_filter_keeps_short_prefix_titles() {
        let results = vec![item(1, "Björk", "Debut")];
        let filtered = filter_by_album_words(results, "Debut");
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn version_suffix_is_lifted_from_raw_message() {
        let song = extend_song_with_version(
            "Blue Monday",
            "play Blue Monday (Hardfloor Remix) please",
        );
        assert_eq!(song, "Blue Monday (hardfloor remix)");
        let unchanged = extend_song_with_version("Blue Monday", "play Blue Monday");
        assert_eq!(unchanged, "Blue Monday");
    }
}
