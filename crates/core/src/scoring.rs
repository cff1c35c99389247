// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token-set similarity scoring.
//!
//! The score is invariant to token order and duplicates, which is what
//! makes it usable for comparing free-form request strings against
//! `"artist title"` concatenations.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

use crate::matching::tokenize;

/// Minimum score at which a misspelled artist is corrected to a catalog
/// artist.
pub const ARTIST_SIMILARITY_THRESHOLD: u32 = 85;

/// Minimum score for a catalog candidate to survive the fuzzy search
/// fallback.
pub const FUZZY_MATCH_THRESHOLD: u32 = 70;

/// Minimum score for a tracklist entry to count as the requested song.
pub const TRACK_TITLE_THRESHOLD: u32 = 80;

fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

/// Token-set similarity of two strings in `[0, 100]`.
///
/// Both inputs are normalized and tokenized; the score is the best edit
/// ratio between the sorted token intersection and each side's sorted
/// token union, so shared words dominate and word order is irrelevant.
#[must_use]
pub fn token_set_ratio(a: &str, b: &str) -> u32 {
    let tokens_a: BTreeSet<String> = tokenize(a).into_iter().collect();
    let tokens_b: BTreeSet<String> = tokenize(b).into_iter().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).map(String::as_str).collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).map(String::as_str).collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).map(String::as_str).collect();

    let base = intersection.join(" ");
    let combined_a = [intersection.as_slice(), only_a.as_slice()].concat().join(" ");
    let combined_b = [intersection.as_slice(), only_b.as_slice()].concat().join(" ");

    let best = ratio(&base, &combined_a)
        .max(ratio(&base, &combined_b))
        .max(ratio(&combined_a, &combined_b));
    (best * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_100() {
        assert_eq!(token_set_ratio("Emperor Tomato Ketchup", "Emperor Tomato Ketchup"), 100);
    }

    #[test]
    fn order_invariant() {
        let forward = token_set_ratio("Lucinda Williams Car Wheels", "Car Wheels Lucinda Williams");
        assert_eq!(forward, 100);
    }

    #[test]
    fn misspelled_artist_clears_correction_threshold() {
        let score = token_set_ratio("lucinda willias", "Lucinda Williams");
        assert!(score >= ARTIST_SIMILARITY_THRESHOLD, "score was {score}");
    }

    #[test]
    fn unrelated_artist_stays_below_threshold() {
        for other in ["Luna", "Lucero", "Lush", "The Lumineers"] {
            let score = token_set_ratio("lucinda willias", other);
            assert!(score < ARTIST_SIMILARITY_THRESHOLD, "{other} scored {score}");
        }
    }

    #[test]
    fn typo_in_title_clears_fuzzy_threshold() {
        let score = token_set_ratio("stereolab emporer tomato kechup", "Stereolab Emperor Tomato Ketchup");
        assert!(score >= FUZZY_MATCH_THRESHOLD, "score was {score}");
    }

    #[test]
    fn diacritics_do_not_affect_score() {
        assert_eq!(token_set_ratio("jorgen plaetner", "Jørgen Plaetner"), 100);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(token_set_ratio("", "something"), 0);
        assert_eq!(token_set_ratio("", ""), 0);
        // Only stopwords and one-letter tokens.
        assert_eq!(token_set_ratio("the a an", "something"), 0);
    }
}
