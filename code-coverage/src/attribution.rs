// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use coverage_telemetry::{Event, EventData};
use downcast_rs::Downcast;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commit_coverage::CommitCoverage;

pub mod command;

pub use self::command::CommandAttributor;

/// A changeset as described by the repository history service. Only `node` is
/// interpreted; everything else is passed through to the attributor.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Changeset {
    pub node: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Changeset {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PathCoverage {
    #[serde(default)]
    pub lines_added: u64,

    #[serde(default)]
    pub lines_covered: u64,

    #[serde(default)]
    pub lines_unknown: u64,
}

/// Coverage of the lines a single changeset touched, per file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChangesetCoverage {
    #[serde(default)]
    pub paths: BTreeMap<String, PathCoverage>,
}

impl ChangesetCoverage {
    /// Sum of the per-file counters. Fails if any total exceeds `u64`.
    pub fn summarize(&self) -> Result<CommitCoverage> {
        let mut total = CommitCoverage::default();

        for (path, coverage) in &self.paths {
            total = CommitCoverage {
                added: checked_sum(total.added, coverage.lines_added, "lines_added", path)?,
                covered: checked_sum(total.covered, coverage.lines_covered, "lines_covered", path)?,
                unknown: checked_sum(total.unknown, coverage.lines_unknown, "lines_unknown", path)?,
            };
        }

        Ok(total)
    }
}

fn checked_sum(total: u64, value: u64, counter: &str, path: &str) -> Result<u64> {
    total
        .checked_add(value)
        .ok_or_else(|| format_err!("{} overflows adding {} of {}", counter, value, path))
}

/// Per-changeset coverage, keyed by changeset node.
pub type AttributionResults = HashMap<String, ChangesetCoverage>;

/// Resolves which changesets a report produced at a given revision covers.
#[async_trait]
pub trait IRepositoryHistory: Downcast + Send + Sync {
    async fn relevant_changesets(&self, revision: &str) -> Result<Vec<Changeset>>;
}

impl_downcast!(IRepositoryHistory);

/// Maps a covdir report onto the lines each changeset touched.
#[async_trait]
pub trait ICoverageAttributor: Downcast + Send + Sync {
    async fn generate(
        &self,
        revision: &str,
        report: &Value,
        changesets: &[Changeset],
    ) -> Result<AttributionResults>;
}

impl_downcast!(ICoverageAttributor);

pub struct ChangesetAttributor {
    history: Box<dyn IRepositoryHistory>,
    coverage: Box<dyn ICoverageAttributor>,
}

impl ChangesetAttributor {
    pub fn new(
        history: Box<dyn IRepositoryHistory>,
        coverage: Box<dyn ICoverageAttributor>,
    ) -> Self {
        Self { history, coverage }
    }

    pub fn coverage(&self) -> &dyn ICoverageAttributor {
        self.coverage.as_ref()
    }

    pub async fn relevant_changesets(&self, revision: &str) -> Result<Vec<Changeset>> {
        self.history
            .relevant_changesets(revision)
            .await
            .with_context(|| format!("resolving changesets relevant to {}", revision))
    }

    /// Coverage of every changeset relevant to the report at `revision`, in
    /// relevance order. Changesets without attributed coverage map to `None`.
    pub async fn generate(
        &self,
        revision: &str,
        report: &Value,
    ) -> Result<Vec<(String, Option<CommitCoverage>)>> {
        let changesets = self.relevant_changesets(revision).await?;
        let results = self
            .coverage
            .generate(revision, report, &changesets)
            .await
            .with_context(|| format!("attributing coverage of {}", revision))?;

        attribute(&results, &changesets)
    }
}

pub fn attribute(
    results: &AttributionResults,
    changesets: &[Changeset],
) -> Result<Vec<(String, Option<CommitCoverage>)>> {
    changesets
        .iter()
        .map(|changeset| -> Result<(String, Option<CommitCoverage>)> {
            let coverage = match results.get(&changeset.node) {
                Some(coverage) => Some(
                    coverage
                        .summarize()
                        .with_context(|| format!("summarizing coverage of {}", changeset.node))?,
                ),
                None => {
                    info!("no coverage found for changeset {}", changeset.node);
                    event!(Event::commit_coverage_missing; EventData::Changeset = changeset.node.as_str());
                    None
                }
            };

            Ok((changeset.node.clone(), coverage))
        })
        .collect()
}

#[cfg(test)]
pub mod double;
