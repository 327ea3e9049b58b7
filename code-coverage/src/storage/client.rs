// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;

use super::{BucketUrl, IObjectStore, ObjectMetadata, StoredObject};
use crate::error::NotFoundError;
use crate::http::ResponseExt;

/// Object store client speaking the Cloud Storage JSON API.
///
/// Requests are sent once. Writes have no idempotency key beyond overwriting
/// the same name, so failures are surfaced to the caller instead of retried.
#[derive(Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    bucket: BucketUrl,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl StorageClient {
    pub fn new(bucket: BucketUrl, access_token: Option<String>) -> Self {
        let client = reqwest::Client::new();

        Self {
            client,
            bucket,
            access_token,
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);

        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let url = self.bucket.object(name)?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .context("StorageClient.exists")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        response
            .error_for_status_with_body()
            .await
            .context("StorageClient.exists status")?;

        Ok(true)
    }

    pub async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<StoredObject> {
        let url = self.bucket.upload(name)?;
        self.request(Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .context("StorageClient.put")?
            .error_for_status_with_body()
            .await
            .context("StorageClient.put status")?;

        // Metadata is patched after the write, so an interrupted upload leaves an
        // object without content headers rather than no object at all.
        let url = self.bucket.object(name)?;
        let object = self
            .request(Method::PATCH, url)
            .json(metadata)
            .send()
            .await
            .context("StorageClient.put metadata")?
            .error_for_status_with_body()
            .await
            .context("StorageClient.put metadata status")?
            .json()
            .await
            .context("StorageClient.put metadata response")?;

        Ok(object)
    }

    pub async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.bucket.media(name)?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .context("StorageClient.get")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(NotFoundError::new(format!("{}/{}", self.bucket, name)).into());
        }

        let data = response
            .error_for_status_with_body()
            .await
            .context("StorageClient.get status")?
            .bytes()
            .await
            .context("StorageClient.get body")?;

        Ok(data.to_vec())
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = vec![];
        let mut page_token: Option<String> = None;

        loop {
            let url = self.bucket.list(prefix, page_token.as_deref())?;
            let page: ObjectList = self
                .request(Method::GET, url)
                .send()
                .await
                .context("StorageClient.list")?
                .error_for_status_with_body()
                .await
                .context("StorageClient.list status")?
                .json()
                .await
                .context("StorageClient.list response")?;

            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }
}

#[async_trait]
impl IObjectStore for StorageClient {
    async fn exists(&self, name: &str) -> Result<bool> {
        self.exists(name).await
    }

    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<StoredObject> {
        StorageClient::put(self, name, data, metadata).await
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.get(name).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.list(prefix).await
    }
}
