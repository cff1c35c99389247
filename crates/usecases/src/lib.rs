// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lookup orchestration: the strategy pipeline and the six-step request
//! flow, written against the service seams in [`ports`] so the catalog
//! store and the metadata tier stay pluggable.

#![deny(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

use thiserror::Error;

pub mod orchestrator;
pub mod ports;
pub mod search;
pub mod state;
pub mod strategies;

#[cfg(test)]
pub(crate) mod mock;

#[derive(Error, Debug)]
pub enum Error {
    /// No searchable fields were present in the request.
    #[error("no searchable fields in request")]
    InvalidInput,

    /// The catalog backing store is missing or unreadable.
    #[error("library catalog is unavailable")]
    StoreUnavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
