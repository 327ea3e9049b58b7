// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::archive::ArchiveCodec;
use crate::attribution::CommandAttributor;
use crate::hgmo::DEFAULT_HGMO_URL;
use crate::storage::url::DEFAULT_STORAGE_URL;
use crate::storage::BucketUrl;

const INDEX_URL_TEMPLATE: &str = "https://firefox-ci-tc.services.mozilla.com/api/index/v1/task/project.relman.code-coverage.{channel}.cron.latest/artifacts/public/commit_coverage.json.zst";

/// External command computing per-changeset coverage.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct AttributorConfig {
    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Config {
    /// Bucket holding the covdir reports.
    pub bucket: String,

    /// Object store API base, Cloud Storage when absent.
    pub storage_url: Option<Url>,

    /// OAuth bearer token for the object store. Anonymous when absent.
    pub access_token: Option<String>,

    pub backend_host: Url,

    /// Deployment channel (`production`, `testing`), selects the index URL.
    #[serde(default)]
    pub app_channel: String,

    /// Overrides the index artifact URL derived from `app_channel`.
    pub index_url: Option<Url>,

    pub hgmo_url: Option<Url>,

    pub attributor: Option<AttributorConfig>,

    pub compression_threads: Option<u32>,

    /// Where `commit_coverage.json.zst` is written, if anywhere.
    pub artifacts_dir: Option<PathBuf>,
}

impl Config {
    pub fn new(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data).context("parsing config")?;

        if config.bucket.is_empty() {
            bail!("config bucket must not be empty");
        }

        if config.app_channel.is_empty() && config.index_url.is_none() {
            bail!("config needs an app_channel or an index_url");
        }

        Ok(config)
    }

    pub async fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let data = tokio::fs::read(config_path)
            .await
            .with_context(|| format!("reading config {}", config_path.display()))?;
        Self::new(&data)
    }

    pub fn index_url(&self) -> Result<Url> {
        if let Some(url) = &self.index_url {
            return Ok(url.clone());
        }

        let url = INDEX_URL_TEMPLATE.replace("{channel}", &self.app_channel);
        Url::parse(&url).with_context(|| format!("invalid app_channel: {}", self.app_channel))
    }

    pub fn storage_url(&self) -> Result<Url> {
        match &self.storage_url {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(DEFAULT_STORAGE_URL)?),
        }
    }

    pub fn hgmo_url(&self) -> Result<Url> {
        match &self.hgmo_url {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(DEFAULT_HGMO_URL)?),
        }
    }

    pub fn bucket_url(&self) -> Result<BucketUrl> {
        BucketUrl::new(self.storage_url()?, &self.bucket)
    }

    pub fn codec(&self) -> ArchiveCodec {
        match self.compression_threads {
            Some(threads) => ArchiveCodec::new(threads),
            None => ArchiveCodec::default(),
        }
    }

    pub fn attributor(&self, repository: &str) -> Result<CommandAttributor> {
        let attributor = self
            .attributor
            .as_ref()
            .ok_or_else(|| format_err!("config has no attributor command"))?;

        Ok(CommandAttributor::new(
            repository,
            attributor.program.clone(),
            attributor.args.clone(),
        ))
    }
}
