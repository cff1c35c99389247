// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

use diesel::{connection::SimpleConnection as _, prelude::*, r2d2};

use crate::Result;

pub mod gatekeeper;

pub type ConnectionManager = r2d2::ConnectionManager<SqliteConnection>;

pub type ConnectionPool = r2d2::Pool<ConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<ConnectionManager>;

pub fn create_connection_pool(database_url: &str, max_size: u32) -> Result<ConnectionPool> {
    log::info!("Creating SQLite connection pool for {database_url}");
    let manager = ConnectionManager::new(database_url);
    let pool = ConnectionPool::builder().max_size(max_size).build(manager)?;
    Ok(pool)
}

pub fn get_pooled_connection(pool: &ConnectionPool) -> Result<PooledConnection> {
    pool.get().map_err(Into::into)
}

pub fn initialize_database(connection: &mut SqliteConnection) -> Result<()> {
    log::info!("Initializing database");
    connection.batch_execute(
        r#"
PRAGMA journal_mode = WAL;   -- better read-concurrency
PRAGMA synchronous = NORMAL; -- fsync only in critical moments, safe for journal_mode = WAL
PRAGMA encoding = 'UTF-8';
"#,
    )?;
    Ok(())
}
