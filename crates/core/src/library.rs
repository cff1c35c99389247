// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

/// A single release in the station's curated catalog.
///
/// Items are immutable within a request and uniquely identified by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: i64,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub call_letters: Option<String>,
    pub artist_call_number: Option<i64>,
    pub release_call_number: Option<i64>,
    pub genre: Option<String>,
    pub format: Option<String>,
}

impl LibraryItem {
    /// Full call number for shelf lookup:
    /// `<Genre> <Format> <Letters> <ArtistNum>/<ReleaseNum>`.
    #[must_use]
    pub fn call_number(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        if let Some(genre) = &self.genre {
            parts.push(genre.clone());
        }
        if let Some(format) = &self.format {
            parts.push(format.clone());
        }
        if let Some(letters) = &self.call_letters {
            parts.push(letters.clone());
        }
        if let Some(artist_no) = self.artist_call_number {
            parts.push(artist_no.to_string());
        }
        if let Some(release_no) = self.release_call_number {
            if let Some(last) = parts.last_mut() {
                *last = format!("{last}/{release_no}");
            }
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> LibraryItem {
        LibraryItem {
            id: 7,
            artist: Some("Stereolab".into()),
            title: Some("Emperor Tomato Ketchup".into()),
            call_letters: Some("STE".into()),
            artist_call_number: Some(12),
            release_call_number: Some(3),
            genre: Some("Rock".into()),
            format: Some("CD".into()),
        }
    }

    #[test]
    fn call_number_joins_all_parts() {
        assert_eq!(item().call_number(), "Rock CD STE 12/3");
    }

    #[test]
    fn call_number_skips_missing_parts() {
        let mut item = item();
        item.format = None;
        item.release_call_number = None;
        assert_eq!(item.call_number(), "Rock STE 12");
    }
}
