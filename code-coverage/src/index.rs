// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{Context, Result};
use downcast_rs::Downcast;
use reqwest::{StatusCode, Url};

use crate::error::NotFoundError;
use crate::http::ResponseExt;

/// Where the previously published commit coverage index is read from.
///
/// A source that has never been published returns a `NotFoundError`.
#[async_trait]
pub trait IIndexSource: Downcast + Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>>;
}

impl_downcast!(IIndexSource);

/// Downloads the compressed index published as an artifact of the last run.
pub struct IndexDownloader {
    client: reqwest::Client,
    url: Url,
}

impl IndexDownloader {
    pub fn new(url: Url) -> Self {
        let client = reqwest::Client::new();

        Self { client, url }
    }
}

#[async_trait]
impl IIndexSource for IndexDownloader {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .context("IndexDownloader.fetch")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(NotFoundError::new(self.url.as_str()).into());
        }

        let data = response
            .error_for_status_with_body()
            .await
            .context("IndexDownloader.fetch status")?
            .bytes()
            .await
            .context("IndexDownloader.fetch body")?;

        Ok(data.to_vec())
    }
}

#[cfg(test)]
pub mod double;
