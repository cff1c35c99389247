// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

// The `library_fts` full-text index mirrors (artist, title) and is only
// reachable through raw MATCH queries, so no table! definition exists
// for it.

diesel::table! {
    library (id) {
        id -> BigInt,
        artist -> Nullable<Text>,
        title -> Nullable<Text>,
        call_letters -> Nullable<Text>,
        artist_call_number -> Nullable<BigInt>,
        release_call_number -> Nullable<BigInt>,
        genre -> Nullable<Text>,
        format -> Nullable<Text>,
    }
}
