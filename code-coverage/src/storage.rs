// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use anyhow::Result;
use downcast_rs::Downcast;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod url;

pub use self::client::StorageClient;
pub use self::url::BucketUrl;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const ZSTD_CONTENT_ENCODING: &str = "zstd";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub content_type: String,
    pub content_encoding: String,
}

impl ObjectMetadata {
    /// Metadata of every archive written by this crate.
    pub fn zstd_json() -> Self {
        Self {
            content_type: JSON_CONTENT_TYPE.to_owned(),
            content_encoding: ZSTD_CONTENT_ENCODING.to_owned(),
        }
    }
}

/// Handle to an object after it has been written and its metadata patched.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub bucket: String,
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_encoding: Option<String>,
}

impl fmt::Display for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)
    }
}

/// Raw object access. Absence on `get` is reported as a `NotFoundError`.
#[async_trait]
pub trait IObjectStore: Downcast + Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Write `data` under `name`, overwriting any previous content, then set
    /// `metadata` on the stored object.
    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<StoredObject>;

    async fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Names of all objects starting with `prefix`, in store order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

impl_downcast!(IObjectStore);

#[cfg(test)]
pub mod double;
