// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared persistent cache of previously observed releases.
//!
//! Backed by Postgres with a pg_trgm index over release artists and
//! track titles. Entries are upserted keyed by `release_id` and survive
//! process restarts. Every query is bounded by a 3 second timeout; the
//! service layer treats any failure here as a tier miss.

use std::{future::Future, time::Duration};

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    types::Json,
};

use euterpe_core::{
    matching::{is_compilation_artist, normalize},
    release::{release_url, Release, ReleaseRef},
};

use crate::{Error, Result};

const QUERY_TIMEOUT: Duration = Duration::from_secs(3);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_CONNECTIONS: u32 = 4;

/// A release row served from the persistent tier.
#[derive(Debug, Clone)]
pub struct CachedRelease {
    pub release_id: i64,
    pub title: String,
    pub artist: String,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PgReleaseCache {
    pool: PgPool,
}

async fn with_timeout<T, F>(future: F) -> Result<T>
where
    F: Future<Output = sqlx::Result<T>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, future).await {
        Ok(result) => result.map_err(Error::Cache),
        Err(_) => Err(Error::CacheTimeout),
    }
}

impl PgReleaseCache {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(database_url)
            .await?;
        log::info!("Connected to persistent release cache");
        Ok(Self { pool })
    }

    /// Create the cache tables and trigram indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        if let Err(err) = sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_trgm")
            .execute(&self.pool)
            .await
        {
            log::warn!("Could not ensure pg_trgm extension: {err}");
        }
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS releases ( \
                 release_id BIGINT PRIMARY KEY, \
                 title TEXT NOT NULL, \
                 artist TEXT NOT NULL, \
                 data JSONB NOT NULL, \
                 updated_at TIMESTAMPTZ NOT NULL DEFAULT now() \
             )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS release_tracks ( \
                 release_id BIGINT NOT NULL \
                     REFERENCES releases (release_id) ON DELETE CASCADE, \
                 track_title TEXT NOT NULL, \
                 normalized_track_title TEXT NOT NULL \
             )",
        )
        .execute(&self.pool)
        .await?;
        for statement in [
            "CREATE INDEX IF NOT EXISTS release_tracks_title_trgm \
             ON release_tracks USING gin (normalized_track_title gin_trgm_ops)",
            "CREATE INDEX IF NOT EXISTS releases_artist_trgm \
             ON releases USING gin (lower(artist) gin_trgm_ops)",
            "CREATE INDEX IF NOT EXISTS releases_title_trgm \
             ON releases USING gin (lower(title) gin_trgm_ops)",
        ] {
            if let Err(err) = sqlx::query(statement).execute(&self.pool).await {
                log::warn!("Could not ensure trigram index: {err}");
            }
        }
        Ok(())
    }

    pub async fn is_available(&self) -> bool {
        with_timeout(sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool))
            .await
            .map(|one| one == 1)
            .unwrap_or(false)
    }

    /// Releases whose tracklist fuzzily contains the given track, in
    /// trigram-similarity order.
    pub async fn lookup_releases_by_track(
        &self,
        track: &str,
        artist: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ReleaseRef>> {
        let rows: Vec<(i64, String, String)> = with_timeout(
            sqlx::query_as(
                "WITH matching_tracks AS ( \
                     SELECT DISTINCT rt.release_id, \
                            similarity(rt.normalized_track_title, $1) AS sim \
                     FROM release_tracks rt \
                     WHERE rt.normalized_track_title % $1 \
                     ORDER BY sim DESC \
                     LIMIT $2 \
                 ) \
                 SELECT r.release_id, r.title, r.artist \
                 FROM matching_tracks mt \
                 JOIN releases r ON r.release_id = mt.release_id \
                 WHERE $3::text IS NULL OR lower(r.artist) % lower($3) \
                 ORDER BY mt.sim DESC",
            )
            .bind(normalize(track))
            .bind((limit * 2) as i64)
            .bind(artist)
            .fetch_all(&self.pool),
        )
        .await?;

        let mut results = Vec::new();
        let mut seen_albums = std::collections::HashSet::new();
        for (release_id, title, artist) in rows {
            if !seen_albums.insert(title.to_lowercase()) {
                continue;
            }
            results.push(ReleaseRef {
                release_id,
                release_url: release_url(release_id),
                title,
                is_compilation: is_compilation_artist(&artist),
                artist,
            });
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    pub async fn lookup_release(&self, release_id: i64) -> Result<Option<Release>> {
        let row: Option<(Json<Release>,)> = with_timeout(
            sqlx::query_as("SELECT data FROM releases WHERE release_id = $1")
                .bind(release_id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(|(Json(mut release),)| {
            release.cached = true;
            release
        }))
    }

    /// Upsert a release observed from the upstream tier.
    pub async fn write_release(&self, release: &Release) -> Result<()> {
        let write = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                "INSERT INTO releases (release_id, title, artist, data, updated_at) \
                 VALUES ($1, $2, $3, $4, now()) \
                 ON CONFLICT (release_id) DO UPDATE SET \
                     title = EXCLUDED.title, \
                     artist = EXCLUDED.artist, \
                     data = EXCLUDED.data, \
                     updated_at = now()",
            )
            .bind(release.release_id)
            .bind(&release.title)
            .bind(&release.artist)
            .bind(Json(release))
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM release_tracks WHERE release_id = $1")
                .bind(release.release_id)
                .execute(&mut *tx)
                .await?;
            for track in &release.tracklist {
                sqlx::query(
                    "INSERT INTO release_tracks \
                         (release_id, track_title, normalized_track_title) \
                     VALUES ($1, $2, $3)",
                )
                .bind(release.release_id)
                .bind(&track.title)
                .bind(normalize(&track.title))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        };
        with_timeout(write).await?;
        log::debug!("Cached release {}: {}", release.release_id, release.title);
        Ok(())
    }

    /// Fuzzy release search by artist and/or title, best similarity
    /// first.
    pub async fn search_releases(
        &self,
        artist: Option<&str>,
        album: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CachedRelease>> {
        let fetch_limit = (limit * 2) as i64;
        let rows: Vec<(i64, String, String, Option<String>)> = match (album, artist) {
            (Some(album), Some(artist)) => {
                with_timeout(
                    sqlx::query_as(
                        "SELECT release_id, title, artist, artwork_url FROM ( \
                             SELECT release_id, title, artist, \
                                    data->>'artwork_url' AS artwork_url, \
                                    GREATEST(similarity(lower(title), lower($1)), \
                                             similarity(lower(artist), lower($2))) AS score \
                             FROM releases \
                             WHERE lower(title) % lower($1) OR lower(artist) % lower($2) \
                         ) sub \
                         ORDER BY score DESC \
                         LIMIT $3",
                    )
                    .bind(album)
                    .bind(artist)
                    .bind(fetch_limit)
                    .fetch_all(&self.pool),
                )
                .await?
            }
            (None, Some(artist)) => {
                with_timeout(
                    sqlx::query_as(
                        "SELECT release_id, title, artist, artwork_url FROM ( \
                             SELECT release_id, title, artist, \
                                    data->>'artwork_url' AS artwork_url, \
                                    similarity(lower(artist), lower($1)) AS score \
                             FROM releases \
                             WHERE lower(artist) % lower($1) \
                         ) sub \
                         ORDER BY score DESC \
                         LIMIT $2",
                    )
                    .bind(artist)
                    .bind(fetch_limit)
                    .fetch_all(&self.pool),
                )
                .await?
            }
            (Some(album), None) => {
                with_timeout(
                    sqlx::query_as(
                        "SELECT release_id, title, artist, artwork_url FROM ( \
                             SELECT release_id, title, artist, \
                                    data->>'artwork_url' AS artwork_url, \
                                    similarity(lower(title), lower($1)) AS score \
                             FROM releases \
                             WHERE lower(title) % lower($1) \
                         ) sub \
                         ORDER BY score DESC \
                         LIMIT $2",
                    )
                    .bind(album)
                    .bind(fetch_limit)
                    .fetch_all(&self.pool),
                )
                .await?
            }
            (None, None) => Vec::new(),
        };

        let mut results = Vec::new();
        let mut seen_titles = std::collections::HashSet::new();
        for (release_id, title, artist, artwork_url) in rows {
            if !seen_titles.insert(title.to_lowercase()) {
                continue;
            }
            results.push(CachedRelease {
                release_id,
                title,
                artist,
                artwork_url,
            });
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }
}
