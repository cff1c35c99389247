// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SQLite-backed catalog store.
//!
//! The catalog is read-only at query time: a diesel/r2d2 connection pool
//! is guarded by an async gatekeeper that schedules every query as a
//! blocking task, and the three-level search cascade lives in
//! [`search`].

#![deny(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

use std::path::PathBuf;

use thiserror::Error;

pub mod connection;
pub mod models;
pub mod schema;
pub mod search;
pub mod store;

#[derive(Error, Debug)]
pub enum Error {
    #[error("library database not found at {path}")]
    StoreUnavailable { path: PathBuf },

    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    #[error(transparent)]
    DatabaseConnection(#[from] diesel::r2d2::PoolError),

    #[error("timeout: {reason}")]
    TaskTimeout { reason: String },

    #[error(transparent)]
    TaskScheduling(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for euterpe_usecases::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::StoreUnavailable { .. } => Self::StoreUnavailable,
            err => Self::Other(err.into()),
        }
    }
}
