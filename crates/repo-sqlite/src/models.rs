// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::prelude::*;

use euterpe_core::library::LibraryItem;

use crate::schema::library;

#[derive(Debug, Clone, Queryable, QueryableByName)]
#[diesel(table_name = library)]
pub struct LibraryRecord {
    pub id: i64,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub call_letters: Option<String>,
    pub artist_call_number: Option<i64>,
    pub release_call_number: Option<i64>,
    pub genre: Option<String>,
    pub format: Option<String>,
}

impl From<LibraryRecord> for LibraryItem {
    fn from(record: LibraryRecord) -> Self {
        let LibraryRecord {
            id,
            artist,
            title,
            call_letters,
            artist_call_number,
            release_call_number,
            genre,
            format,
        } = record;
        Self {
            id,
            artist,
            title,
            call_letters,
            artist_call_number,
            release_call_number,
            genre,
            format,
        }
    }
}
