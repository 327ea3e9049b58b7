// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;

use reqwest::{StatusCode, Url};
use thiserror::Error;

/// A requested artifact does not exist.
///
/// Call sites decide whether absence means "start empty" or "skip", so this is
/// always carried inside an `anyhow::Error` chain and recovered by downcasting.
#[derive(Debug, Error)]
#[error("artifact not found: {location}")]
pub struct NotFoundError {
    pub location: String,
}

impl NotFoundError {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid zstd stream")]
    Compression(#[source] io::Error),

    #[error("invalid JSON payload")]
    Json(#[source] serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        // serde_json surfaces reader failures as I/O errors; those come from the
        // zstd decoder underneath it.
        if err.is_io() {
            let err: io::Error = err.into();
            DecodeError::Compression(err)
        } else {
            DecodeError::Json(err)
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to ingest report for {repository}@{revision} after {attempts} attempts")]
pub struct IngestionError {
    pub repository: String,
    pub revision: String,
    pub attempts: usize,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
#[error("backend request to {url} failed: {status}: {body}")]
pub struct BackendError {
    pub url: Url,
    pub status: StatusCode,
    pub body: String,
}

/// True when `err`, or any error it wraps, is a `NotFoundError`.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<NotFoundError>())
}
