// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared matching rules for all search operations.
//!
//! Every comparison in the lookup pipeline goes through [`normalize`] so
//! that the query and the comparison target are folded identically.

use any_ascii::any_ascii;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Maximum number of results returned by search operations.
pub const MAX_SEARCH_RESULTS: usize = 5;

/// Words excluded when extracting significant tokens from queries.
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "of", "with", "from", "that", "this", "play", "song", "remix",
    "feat", "featuring", "story", "records",
];

/// Keywords indicating a multi-artist release, matched as
/// case-insensitive substrings of the artist name.
pub const COMPILATION_KEYWORDS: &[&str] = &["various", "soundtrack", "compilation", "v/a", "v.a."];

#[must_use]
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Fold a string for comparison: decompose, drop combining marks,
/// transliterate the remaining non-ASCII letters, lowercase and collapse
/// whitespace runs.
///
/// Letters like `ø` do not decompose into a base plus combining mark, so
/// plain NFKD stripping would leave "Jørgen" distinct from "Jorgen"; the
/// transliteration step folds those as well. The function is idempotent.
#[must_use]
pub fn normalize(text: &str) -> String {
    let stripped: String = text.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let folded = any_ascii(&stripped).to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a normalized string into significant tokens: split on whitespace
/// and punctuation, drop tokens shorter than two characters and drop
/// stopwords.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !is_stopword(t))
        .map(ToOwned::to_owned)
        .collect()
}

/// True if the artist name marks a compilation or soundtrack release.
#[must_use]
pub fn is_compilation_artist(artist: &str) -> bool {
    let artist = artist.to_lowercase();
    COMPILATION_KEYWORDS.iter().any(|kw| artist.contains(kw))
}

/// Detect an ambiguous `X - Y` request where either side could be the
/// artist.
///
/// Only a single ` - ` separator (hyphen, en dash or em dash, with
/// whitespace on both sides) qualifies, and both sides must contain at
/// least one significant token. Returns the trimmed sides.
#[must_use]
pub fn detect_ambiguous_format(raw_message: &str) -> Option<(String, String)> {
    const SEPARATORS: &[&str] = &[" - ", " \u{2013} ", " \u{2014} "];

    let mut split: Option<(&str, &str)> = None;
    let mut occurrences = 0;
    for sep in SEPARATORS {
        for (at, _) in raw_message.match_indices(sep) {
            occurrences += 1;
            if occurrences > 1 {
                return None;
            }
            split = Some((&raw_message[..at], &raw_message[at + sep.len()..]));
        }
    }

    let (part1, part2) = split?;
    let (part1, part2) = (part1.trim(), part2.trim());
    if part1.is_empty() || part2.is_empty() {
        return None;
    }
    if tokenize(part1).is_empty() || tokenize(part2).is_empty() {
        return None;
    }
    Some((part1.to_owned(), part2.to_owned()))
}

/// Confidence that a release search result matches the request.
///
/// Additive over the artist and album fields: +0.4 for an exact match,
/// +0.3 for a substring match, +0.2 bonus when both fields matched well,
/// floored at 0.2 so borderline results remain visible downstream and
/// capped at 1.0.
#[must_use]
pub fn calculate_confidence(
    request_artist: Option<&str>,
    request_album: Option<&str>,
    result_artist: &str,
    result_album: &str,
) -> f64 {
    fn fold(s: &str) -> String {
        s.trim().to_lowercase()
    }
    fn field_score(request: Option<&str>, result: &str) -> f64 {
        let Some(request) = request else {
            return 0.0;
        };
        let (request, result) = (fold(request), fold(result));
        if request.is_empty() || result.is_empty() {
            0.0
        } else if request == result {
            0.4
        } else if result.contains(&request) || request.contains(&result) {
            0.3
        } else {
            0.0
        }
    }

    let mut score = field_score(request_artist, result_artist)
        + field_score(request_album, result_album);
    if score >= 0.6 {
        score += 0.2;
    }
    if score == 0.0 {
        score = 0.2;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_diacritics() {
        assert_eq!(normalize("Björk"), "bjork");
        assert_eq!(normalize("Zoé"), "zoe");
        assert_eq!(normalize("Jørgen Plaetner"), "jorgen plaetner");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Emperor   Tomato\tKetchup "), "emperor tomato ketchup");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in ["Björk", "Jørgen Plaetner", "  A   B  ", "Deee-Lite", "ÆON"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn tokenize_drops_stopwords_and_short_tokens() {
        assert_eq!(
            tokenize("Play the song Car Wheels on a Gravel Road"),
            vec!["car", "wheels", "on", "gravel", "road"]
        );
    }

    #[test]
    fn compilation_artist_detection() {
        assert!(is_compilation_artist("Various"));
        assert!(is_compilation_artist("Various Artists"));
        assert!(is_compilation_artist("Original Soundtrack"));
        assert!(is_compilation_artist("V/A"));
        assert!(!is_compilation_artist("Stereolab"));
        assert!(!is_compilation_artist(""));
    }

    #[test]
    fn ambiguous_format_detects_single_dash() {
        let parts = detect_ambiguous_format("Guerilla Toss - Betty Dreams of Green Men");
        assert_eq!(
            parts,
            Some(("Guerilla Toss".to_owned(), "Betty Dreams of Green Men".to_owned()))
        );
    }

    #[test]
    fn ambiguous_format_accepts_em_dash() {
        let parts = detect_ambiguous_format("Laid Back \u{2014} White Horse");
        assert_eq!(parts, Some(("Laid Back".to_owned(), "White Horse".to_owned())));
    }

    #[test]
    fn ambiguous_format_rejects_tight_hyphen() {
        // "hip-hop" style compounds are not separators.
        assert_eq!(detect_ambiguous_format("Deee-Lite"), None);
    }

    #[test]
    fn ambiguous_format_rejects_multiple_separators() {
        assert_eq!(detect_ambiguous_format("a - b - c"), None);
    }

    #[test]
    fn ambiguous_format_requires_significant_tokens() {
        assert_eq!(detect_ambiguous_format("the - of"), None);
    }

    #[test]
    fn confidence_exact_match_both_fields() {
        let c = calculate_confidence(Some("Stereolab"), Some("Dots and Loops"), "Stereolab", "Dots and Loops");
        assert!((c - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_partial_match() {
        let c = calculate_confidence(Some("Stereolab"), Some("Dots"), "Stereolab", "Dots and Loops");
        // 0.4 + 0.3 -> bonus 0.2 -> 0.9
        assert!((c - 0.9).abs() < 1e-9);
    }

    #[test]
    fn confidence_floor_is_point_two() {
        let c = calculate_confidence(Some("Nobody"), Some("Nothing"), "Someone", "Else");
        assert!((c - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_stays_in_range() {
        let cases = [
            (Some("a"), Some("b"), "a", "b"),
            (None, None, "x", "y"),
            (Some(""), Some(""), "", ""),
        ];
        for (ra, rb, a, b) in cases {
            let c = calculate_confidence(ra, rb, a, b);
            assert!((0.2..=1.0).contains(&c), "confidence {c} out of range");
        }
    }
}
