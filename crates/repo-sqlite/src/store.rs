// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{
    num::NonZeroU64,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use diesel::prelude::*;

use euterpe_core::library::LibraryItem;
use euterpe_usecases::ports::{LibraryStore, SearchOptions};

use crate::{
    connection::{
        create_connection_pool,
        gatekeeper::{Config as GatekeeperConfig, Gatekeeper},
        get_pooled_connection, initialize_database,
    },
    search, Error, Result,
};

/// Upper bound on acquiring a catalog connection; exceeding it degrades
/// to a catalog miss.
const ACQUIRE_READ_TIMEOUT_MILLIS: u64 = 5_000;

/// Async catalog store over the SQLite library file.
///
/// The backing file is replaceable at runtime by the deployment; a
/// missing file surfaces as `StoreUnavailable` instead of a panic.
#[allow(missing_debug_implementations)]
pub struct CatalogStore {
    gatekeeper: Arc<Gatekeeper>,
    db_path: PathBuf,
}

impl CatalogStore {
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self> {
        if !db_path.is_file() {
            return Err(Error::StoreUnavailable {
                path: db_path.to_path_buf(),
            });
        }
        let database_url = db_path.to_string_lossy();
        let pool = create_connection_pool(&database_url, pool_size)?;
        let mut conn = get_pooled_connection(&pool)?;
        initialize_database(&mut conn)?;
        log::info!("Connected to SQLite catalog: {}", db_path.display());
        Ok(Self {
            gatekeeper: Arc::new(Gatekeeper::new(
                pool,
                GatekeeperConfig {
                    acquire_read_timeout_millis: NonZeroU64::new(ACQUIRE_READ_TIMEOUT_MILLIS)
                        .expect("non-zero timeout"),
                },
            )),
            db_path: db_path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn decommission(&self) {
        self.gatekeeper.decommission();
    }

    /// Liveness probe for the health endpoint.
    pub async fn is_available(&self) -> bool {
        self.gatekeeper
            .spawn_blocking_read_task(|mut conn| {
                diesel::sql_query("SELECT 1").execute(&mut conn).is_ok()
            })
            .await
            .unwrap_or(false)
    }

    async fn run_read<H, R>(&self, handler: H) -> Result<R>
    where
        H: FnOnce(&mut SqliteConnection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.gatekeeper
            .spawn_blocking_read_task(move |mut conn| handler(&mut conn))
            .await?
    }
}

#[async_trait]
impl LibraryStore for CatalogStore {
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> euterpe_usecases::Result<Vec<LibraryItem>> {
        let query = query.to_owned();
        match self
            .run_read(move |conn| search::search_catalog(conn, &query, &options))
            .await
        {
            Ok(items) => Ok(items),
            Err(Error::TaskTimeout { reason }) => {
                log::warn!("Catalog search timed out ({reason}), treating as miss");
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_similar_artist(
        &self,
        artist: &str,
    ) -> euterpe_usecases::Result<Option<String>> {
        let artist = artist.to_owned();
        match self
            .run_read(move |conn| search::find_similar_artist(conn, &artist))
            .await
        {
            Ok(corrected) => Ok(corrected),
            Err(Error::TaskTimeout { reason }) => {
                log::warn!("Artist correction timed out ({reason}), treating as miss");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_catalog_file_is_store_unavailable() {
        let result = CatalogStore::open(Path::new("/nonexistent/library.db"), 2);
        assert!(matches!(result, Err(Error::StoreUnavailable { .. })));
    }
}
