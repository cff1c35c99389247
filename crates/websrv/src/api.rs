// SPDX-FileCopyrightText: Copyright (C) 2022-2026 The euterpe authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error mapping from the service crates onto HTTP responses.

use std::{convert::Infallible, error::Error as StdError};

use serde::Serialize;
use thiserror::Error;
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{self, InvalidQuery, MethodNotAllowed, Reject, Rejection},
    Reply,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    BadRequest(anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("upstream error: {0}")]
    Upstream(anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<euterpe_usecases::Error> for Error {
    fn from(err: euterpe_usecases::Error) -> Self {
        use euterpe_usecases::Error::*;
        match err {
            InvalidInput => Self::BadRequest(anyhow::Error::new(InvalidInput)),
            StoreUnavailable => Self::ServiceUnavailable,
            Other(err) => Self::Other(err),
        }
    }
}

impl From<euterpe_discogs::Error> for Error {
    fn from(err: euterpe_discogs::Error) -> Self {
        use euterpe_discogs::Error::*;
        match err {
            err @ (Request(_) | UpstreamStatus { .. } | RateLimited) => {
                Self::Upstream(err.into())
            }
            err @ (Cache(_) | CacheTimeout) => Self::Other(err.into()),
            Other(err) => Self::Other(err),
        }
    }
}

impl Reject for Error {}

pub fn reject_on_error(err: impl Into<Error>) -> Rejection {
    reject::custom(err.into())
}

/// An API error serializable to JSON.
#[derive(Debug, Serialize)]
struct ErrorResponseBody {
    code: u16,
    message: String,
}

fn status_code_to_string(code: StatusCode) -> String {
    code.canonical_reason().unwrap_or(code.as_str()).to_string()
}

pub async fn handle_rejection(reject: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if reject.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = status_code_to_string(code);
    } else if let Some(err) = reject.find::<InvalidQuery>() {
        code = StatusCode::BAD_REQUEST;
        message = err
            .source()
            .map(ToString::to_string)
            .unwrap_or_else(|| err.to_string());
    } else if let Some(err) = reject.find::<BodyDeserializeError>() {
        code = StatusCode::BAD_REQUEST;
        message = err
            .source()
            .map(ToString::to_string)
            .unwrap_or_else(|| err.to_string());
    } else if let Some(err) = reject.find::<Error>() {
        match err {
            Error::BadRequest(err) => {
                code = StatusCode::BAD_REQUEST;
                message = err.to_string();
            }
            Error::NotFound => {
                code = StatusCode::NOT_FOUND;
                message = status_code_to_string(code);
            }
            Error::ServiceUnavailable => {
                code = StatusCode::SERVICE_UNAVAILABLE;
                message = status_code_to_string(code);
            }
            Error::Upstream(err) => {
                code = StatusCode::BAD_GATEWAY;
                message = err.to_string();
            }
            Error::Other(err) => {
                code = StatusCode::INTERNAL_SERVER_ERROR;
                message = err.to_string();
            }
        }
    } else if let Some(err) = reject.find::<MethodNotAllowed>() {
        // This must have the least priority, because most rejections
        // contain a MethodNotAllowed element!
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = err.to_string();
    } else {
        log::error!("Unhandled rejection {reject:?}");
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = format!("{reject:?}");
    }

    let json_reply = warp::reply::json(&ErrorResponseBody {
        code: code.as_u16(),
        message,
    });
    Ok(warp::reply::with_status(json_reply, code))
}
