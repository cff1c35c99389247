// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The three-level search cascade over the catalog.
//!
//! 1. FTS5 full-text match, ranked. Syntax errors and empty results fall
//!    through.
//! 2. Token-AND substring match, diacritics folded, in insertion order.
//! 3. Fuzzy token-set scoring over candidates sharing a 3-character
//!    prefix with the longest query token.

use diesel::{prelude::*, sql_types::BigInt, sql_types::Text};

use euterpe_core::{
    library::LibraryItem,
    matching::{is_stopword, normalize, tokenize},
    scoring::{token_set_ratio, ARTIST_SIMILARITY_THRESHOLD, FUZZY_MATCH_THRESHOLD},
};
use euterpe_usecases::ports::SearchOptions;

use crate::{models::LibraryRecord, schema::library, Result};

/// Upper bound on candidates scored by the fuzzy level and by artist
/// correction.
const CANDIDATE_LIMIT: usize = 500;

/// Run the search cascade.
pub fn search_catalog(
    conn: &mut SqliteConnection,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<LibraryItem>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Post-filtering by artist can discard rows, so fetch a deeper page
    // when a filter is set.
    let fetch_limit = if options.artist_filter.is_some() {
        options.limit.max(1) * 10
    } else {
        options.limit
    };

    let mut results = match fts_search(conn, query, fetch_limit) {
        Ok(records) => records,
        Err(err) => {
            // FTS5 rejects queries with operator characters.
            if !options.fallback_to_like {
                return Err(err.into());
            }
            log::info!("Full-text search for '{query}' failed ({err}), trying token fallback");
            Vec::new()
        }
    };

    if results.is_empty() && options.fallback_to_like {
        log::debug!("Full-text search for '{query}' returned no results, trying token fallback");
        results = token_search(conn, query, fetch_limit)?;
    }

    if results.is_empty() && options.fallback_to_fuzzy {
        log::debug!("Token search for '{query}' returned no results, trying fuzzy fallback");
        results = fuzzy_search(conn, query, fetch_limit)?;
    }

    let mut items: Vec<LibraryItem> = results.into_iter().map(Into::into).collect();
    if let Some(filter) = &options.artist_filter {
        let needle = normalize(filter);
        if !needle.is_empty() {
            items.retain(|item| {
                item.artist
                    .as_deref()
                    .map(normalize)
                    .is_some_and(|artist| artist.starts_with(&needle))
            });
        }
    }
    items.truncate(options.limit);
    Ok(items)
}

fn fts_search(
    conn: &mut SqliteConnection,
    query: &str,
    limit: usize,
) -> QueryResult<Vec<LibraryRecord>> {
    diesel::sql_query(
        "SELECT l.id, l.artist, l.title, l.call_letters, l.artist_call_number, \
         l.release_call_number, l.genre, l.format \
         FROM library l \
         JOIN library_fts fts ON l.id = fts.rowid \
         WHERE library_fts MATCH ? \
         ORDER BY fts.rank \
         LIMIT ?",
    )
    .bind::<Text, _>(query)
    .bind::<BigInt, _>(limit as i64)
    .load(conn)
}

fn load_all_records(conn: &mut SqliteConnection) -> QueryResult<Vec<LibraryRecord>> {
    library::table.order(library::id.asc()).load(conn)
}

fn folded_fields(record: &LibraryRecord) -> (String, String) {
    (
        normalize(record.artist.as_deref().unwrap_or_default()),
        normalize(record.title.as_deref().unwrap_or_default()),
    )
}

fn token_search(
    conn: &mut SqliteConnection,
    query: &str,
    limit: usize,
) -> Result<Vec<LibraryRecord>> {
    let mut tokens = tokenize(query);
    if tokens.is_empty() {
        // Nothing but stopwords; match on the raw words instead.
        tokens = normalize(query)
            .split_whitespace()
            .filter(|word| word.len() > 1)
            .map(ToOwned::to_owned)
            .collect();
    }
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    // Folded matching cannot be pushed down into SQLite LIKE.
    let records = load_all_records(conn)?;
    Ok(records
        .into_iter()
        .filter(|record| {
            let (artist, title) = folded_fields(record);
            tokens
                .iter()
                .all(|token| artist.contains(token) || title.contains(token))
        })
        .take(limit)
        .collect())
}

fn fuzzy_search(
    conn: &mut SqliteConnection,
    query: &str,
    limit: usize,
) -> Result<Vec<LibraryRecord>> {
    let normalized = normalize(query);
    let Some(longest) = normalized.split_whitespace().max_by_key(|word| word.len()) else {
        return Ok(Vec::new());
    };
    let prefix: String = longest.chars().take(3).collect();

    let records = load_all_records(conn)?;
    let candidates = records.into_iter().filter(|record| {
        let (artist, title) = folded_fields(record);
        artist.starts_with(&prefix) || title.starts_with(&prefix)
    });

    let mut scored: Vec<(u32, LibraryRecord)> = candidates
        .take(CANDIDATE_LIMIT)
        .filter_map(|record| {
            let combined = format!(
                "{} {}",
                record.artist.as_deref().unwrap_or_default(),
                record.title.as_deref().unwrap_or_default()
            );
            let score = token_set_ratio(query, &combined);
            (score >= FUZZY_MATCH_THRESHOLD).then_some((score, record))
        })
        .collect();

    // Descending by score, ties broken by lower id.
    scored.sort_by(|(score_a, record_a), (score_b, record_b)| {
        score_b.cmp(score_a).then(record_a.id.cmp(&record_b.id))
    });

    if !scored.is_empty() {
        log::info!("Fuzzy search for '{query}' found {} results", scored.len());
    }
    Ok(scored
        .into_iter()
        .take(limit)
        .map(|(_, record)| record)
        .collect())
}

/// Fuzzy-correct an artist name against the distinct catalog artists.
///
/// Candidates share a 3-character prefix with the first significant word
/// of the input; the best token-set score wins if it clears the
/// correction threshold and actually differs from the input.
pub fn find_similar_artist(conn: &mut SqliteConnection, artist: &str) -> Result<Option<String>> {
    let normalized = normalize(artist);
    let Some(search_word) = normalized
        .split_whitespace()
        .find(|word| word.len() >= 3 && !is_stopword(word))
    else {
        return Ok(None);
    };
    let prefix: String = search_word.chars().take(3).collect();

    let artists: Vec<Option<String>> = library::table
        .select(library::artist)
        .distinct()
        .load(conn)?;

    let mut best: Option<(u32, String)> = None;
    for candidate in artists.into_iter().flatten() {
        if !normalize(&candidate).starts_with(&prefix) {
            continue;
        }
        let score = token_set_ratio(artist, &candidate);
        if score >= ARTIST_SIMILARITY_THRESHOLD
            && best.as_ref().map_or(true, |(high, _)| score > *high)
        {
            best = Some((score, candidate));
        }
    }

    Ok(best.and_then(|(score, candidate)| {
        if candidate.to_lowercase() == artist.to_lowercase() {
            None
        } else {
            log::info!("Corrected artist '{artist}' to '{candidate}' (score: {score})");
            Some(candidate)
        }
    }))
}

#[cfg(test)]
mod tests {
    use diesel::connection::SimpleConnection as _;

    use super::*;

    fn open_catalog(rows: &[(i64, &str, &str)]) -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        conn.batch_execute(
            "CREATE TABLE library ( \
                 id INTEGER PRIMARY KEY, \
                 artist TEXT, \
                 title TEXT, \
                 call_letters TEXT, \
                 artist_call_number INTEGER, \
                 release_call_number INTEGER, \
                 genre TEXT, \
                 format TEXT \
             ); \
             CREATE VIRTUAL TABLE library_fts USING fts5( \
                 artist, title, content='library', content_rowid='id' \
             );",
        )
        .unwrap();
        for (id, artist, title) in rows {
            diesel::sql_query(
                "INSERT INTO library (id, artist, title, genre, format) \
                 VALUES (?, ?, ?, 'Rock', 'CD')",
            )
            .bind::<BigInt, _>(*id)
            .bind::<Text, _>(*artist)
            .bind::<Text, _>(*title)
            .execute(&mut conn)
            .unwrap();
        }
        conn.batch_execute(
            "INSERT INTO library_fts (rowid, artist, title) \
             SELECT id, artist, title FROM library;",
        )
        .unwrap();
        conn
    }

    #[test]
    fn full_text_level_finds_exact_title() {
        let mut conn = open_catalog(&[
            (1, "Stereolab", "Emperor Tomato Ketchup"),
            (2, "Lucinda Williams", "Car Wheels on a Gravel Road"),
        ]);
        let results =
            search_catalog(&mut conn, "Emperor Tomato Ketchup", &SearchOptions::default())
                .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn token_level_folds_diacritics() {
        let mut conn = open_catalog(&[(1, "J\u{f8}rgen Plaetner", "Electronic Music")]);
        let results =
            search_catalog(&mut conn, "jorgen plaetner", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].artist.as_deref(), Some("J\u{f8}rgen Plaetner"));
    }

    #[test]
    fn operator_characters_fall_through_to_token_level() {
        let mut conn = open_catalog(&[(1, "Deee-Lite", "World Clique")]);
        let results = search_catalog(&mut conn, "Deee-Lite", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn fuzzy_level_rescues_typos() {
        let mut conn = open_catalog(&[
            (1, "Stereolab", "Emperor Tomato Ketchup"),
            (2, "Lucinda Williams", "Car Wheels on a Gravel Road"),
        ]);
        let results = search_catalog(
            &mut conn,
            "stereolab emporer tomato kechup",
            &SearchOptions::default(),
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn fuzzy_ties_break_by_lower_id() {
        // Two identical pressings; the cascade must order them
        // deterministically.
        let mut conn = open_catalog(&[
            (7, "Stereolab", "Emperor Tomato Ketchup"),
            (3, "Stereolab", "Emperor Tomato Ketchup"),
        ]);
        let results = search_catalog(
            &mut conn,
            "stereolab emporer tomato kechup",
            &SearchOptions::default(),
        )
        .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 3);
        assert_eq!(results[1].id, 7);
    }

    #[test]
    fn artist_filter_drops_other_artists() {
        let mut conn = open_catalog(&[
            (1, "Stereolab", "Dots and Loops"),
            (2, "Tortoise", "Dots and Loops Tribute"),
        ]);
        let options =
            SearchOptions::default().with_artist_filter(Some("Stereolab".to_owned()));
        let results = search_catalog(&mut conn, "Dots and Loops", &options).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].artist.as_deref(), Some("Stereolab"));
    }

    #[test]
    fn empty_query_returns_nothing() {
        let mut conn = open_catalog(&[(1, "Stereolab", "Dots and Loops")]);
        let results = search_catalog(&mut conn, "  ", &SearchOptions::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn artist_correction_accepts_close_misspelling() {
        let mut conn = open_catalog(&[
            (1, "Lucinda Williams", "Car Wheels on a Gravel Road"),
            (2, "Luna", "Penthouse"),
        ]);
        let corrected = find_similar_artist(&mut conn, "lucinda willias").unwrap();
        assert_eq!(corrected.as_deref(), Some("Lucinda Williams"));
    }

    #[test]
    fn artist_correction_rejects_unrelated_artists() {
        let mut conn = open_catalog(&[(1, "Luna", "Penthouse"), (2, "Lush", "Split")]);
        let corrected = find_similar_artist(&mut conn, "lucinda willias").unwrap();
        assert_eq!(corrected, None);
    }

    #[test]
    fn artist_correction_skips_identical_name() {
        let mut conn = open_catalog(&[(1, "Stereolab", "Dots and Loops")]);
        let corrected = find_similar_artist(&mut conn, "stereolab").unwrap();
        assert_eq!(corrected, None);
    }
}
