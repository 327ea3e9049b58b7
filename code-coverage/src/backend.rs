// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use anyhow::{Context, Result};
use coverage_telemetry::{Event, EventData};
use downcast_rs::Downcast;
use reqwest::Url;
use reqwest_retry::{default_retry_check, RetryPolicy, SendRetry};
use serde_json::Value;

use crate::error::IngestionError;
use crate::http::ResponseExt;
use crate::store::{ReportDescriptor, DEFAULT_FILTER};

pub const INGESTION_MAX_ATTEMPTS: usize = 10;
pub const INGESTION_INITIAL_INTERVAL: Duration = Duration::from_secs(16);
pub const INGESTION_MAX_INTERVAL: Duration = Duration::from_secs(64);

/// Notification of new reports is idempotent on the backend, so it is retried;
/// nothing else is.
pub fn ingestion_policy() -> RetryPolicy {
    RetryPolicy::new(
        INGESTION_MAX_ATTEMPTS,
        INGESTION_INITIAL_INTERVAL,
        INGESTION_MAX_INTERVAL,
    )
}

#[async_trait]
pub trait IIngestion: Downcast + Send + Sync {
    /// Ask the backend to ingest a report that has already been uploaded.
    async fn notify(&self, report: &ReportDescriptor) -> Result<()>;

    /// The most recently ingested reports of `repository`.
    async fn latest(&self, repository: &str) -> Result<Value>;
}

impl_downcast!(IIngestion);

pub struct BackendClient {
    client: reqwest::Client,
    host: Url,
    policy: RetryPolicy,
}

impl BackendClient {
    pub fn new(host: Url) -> Self {
        Self::with_policy(host, ingestion_policy())
    }

    pub fn with_policy(host: Url, policy: RetryPolicy) -> Self {
        let client = reqwest::Client::new();

        Self {
            client,
            host,
            policy,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|_| format_err!("invalid backend URL: {}", self.host))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }
}

/// Query of `/v2/path`. Platform and suite are left out for the aggregate
/// report, which is what the backend assumes when they are absent.
pub fn ingestion_params(report: &ReportDescriptor) -> Vec<(&'static str, &str)> {
    let mut params = vec![
        ("repository", report.repository.as_str()),
        ("changeset", report.revision.as_str()),
    ];

    if !report.platform.is_empty() && report.platform != DEFAULT_FILTER {
        params.push(("platform", report.platform.as_str()));
    }

    if !report.suite.is_empty() && report.suite != DEFAULT_FILTER {
        params.push(("suite", report.suite.as_str()));
    }

    params
}

#[async_trait]
impl IIngestion for BackendClient {
    async fn notify(&self, report: &ReportDescriptor) -> Result<()> {
        let url = self.endpoint(&["v2", "path"])?;

        info!(
            "ingesting report on backend host:{} repository:{} revision:{} platform:{} suite:{}",
            self.host, report.repository, report.revision, report.platform, report.suite
        );

        self.client
            .get(url)
            .query(&ingestion_params(report))
            .send_retry(default_retry_check, &self.policy)
            .await
            .map_err(|source| IngestionError {
                repository: report.repository.clone(),
                revision: report.revision.clone(),
                attempts: self.policy.max_attempts,
                source,
            })?;

        info!("successfully ingested report on backend");
        event!(Event::report_ingested;
            EventData::Repository = report.repository.as_str(),
            EventData::Revision = report.revision.as_str()
        );

        Ok(())
    }

    async fn latest(&self, repository: &str) -> Result<Value> {
        let url = self.endpoint(&["v2", "latest"])?;

        let latest = self
            .client
            .get(url)
            .query(&[("repository", repository)])
            .send()
            .await
            .context("BackendClient.latest")?
            .error_for_status_with_body()
            .await
            .context("BackendClient.latest status")?
            .json()
            .await
            .context("BackendClient.latest response")?;

        Ok(latest)
    }
}

#[cfg(test)]
pub mod double;
