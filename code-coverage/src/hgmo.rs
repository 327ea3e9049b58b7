// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

use crate::attribution::{Changeset, IRepositoryHistory};
use crate::http::ResponseExt;

pub const DEFAULT_HGMO_URL: &str = "https://hg.mozilla.org";

#[derive(Debug, Deserialize)]
struct AutomationRelevance {
    changesets: Vec<Changeset>,
}

/// Mercurial server exposing the `json-automationrelevance` view, which lists
/// the changesets a push head brings in (pending ancestors, then the head).
pub struct HgmoClient {
    client: reqwest::Client,
    url: Url,
    repository: String,
}

impl HgmoClient {
    pub fn new(url: Url, repository: impl Into<String>) -> Self {
        let client = reqwest::Client::new();

        Self {
            client,
            url,
            repository: repository.into(),
        }
    }

    fn automation_relevance_url(&self, revision: &str) -> Result<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| format_err!("invalid hgmo URL: {}", self.url))?
            .pop_if_empty()
            .extend(self.repository.split('/'))
            .push("json-automationrelevance")
            .push(revision);

        Ok(url)
    }
}

#[async_trait]
impl IRepositoryHistory for HgmoClient {
    async fn relevant_changesets(&self, revision: &str) -> Result<Vec<Changeset>> {
        let url = self.automation_relevance_url(revision)?;
        let relevance: AutomationRelevance = self
            .client
            .get(url)
            .send()
            .await
            .context("HgmoClient.relevant_changesets")?
            .error_for_status_with_body()
            .await
            .context("HgmoClient.relevant_changesets status")?
            .json()
            .await
            .context("HgmoClient.relevant_changesets response")?;

        Ok(relevance.changesets)
    }
}
