// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use anyhow::Result;
use reqwest::Url;

pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";

/// Addresses the objects of one bucket on a Cloud Storage style JSON API.
#[derive(Clone, Eq, PartialEq)]
pub struct BucketUrl {
    base: Url,
    bucket: String,
}

impl BucketUrl {
    pub fn new(base: Url, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();

        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            bail!("Invalid storage URL: {}", base);
        }

        if bucket.is_empty() || bucket.contains('/') {
            bail!("Invalid bucket name: {:?}", bucket);
        }

        Ok(Self { base, bucket })
    }

    pub fn parse(base: impl AsRef<str>, bucket: impl Into<String>) -> Result<Self> {
        let base = Url::parse(base.as_ref())?;

        Self::new(base, bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Metadata resource of a single object.
    pub fn object(&self, name: &str) -> Result<Url> {
        self.with_segments(&["storage", "v1", "b", &self.bucket, "o", name])
    }

    /// Raw content of a single object.
    pub fn media(&self, name: &str) -> Result<Url> {
        let mut url = self.object(name)?;
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    /// Simple (single request) upload of an object's content.
    pub fn upload(&self, name: &str) -> Result<Url> {
        let mut url = self.with_segments(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", name);
        Ok(url)
    }

    /// One page of the objects whose name starts with `prefix`.
    pub fn list(&self, prefix: &str, page_token: Option<&str>) -> Result<Url> {
        let mut url = self.with_segments(&["storage", "v1", "b", &self.bucket, "o"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    // Each segment is percent-encoded on its own, so an object name keeps its
    // `/` separators as `%2F`.
    fn with_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| format_err!("Invalid storage URL: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl fmt::Debug for BucketUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.base, self.bucket)
    }
}

impl fmt::Display for BucketUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "gs://{}", self.bucket)
    }
}
