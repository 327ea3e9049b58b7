// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use coverage_telemetry::{Event, EventData};
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveCodec;
use crate::attribution::ChangesetAttributor;
use crate::error::is_not_found;
use crate::index::IIndexSource;
use crate::store::{ReportDescriptor, ReportStore, DEFAULT_FILTER};

/// File name of the local copy of the index, published as a task artifact.
pub const COMMIT_COVERAGE_ARTIFACT: &str = "commit_coverage.json.zst";

/// Line coverage of the lines a single commit added or modified.
///
/// `covered + unknown <= added` is expected but not enforced, as these are
/// plain sums of per-file values.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CommitCoverage {
    pub added: u64,
    pub covered: u64,
    pub unknown: u64,
}

/// Coverage of every analyzed commit. `None` means the commit was analyzed but
/// no coverage could be attributed to it.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CommitCoverageIndex {
    commits: BTreeMap<String, Option<CommitCoverage>>,
}

impl CommitCoverageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.commits.contains_key(node)
    }

    pub fn get(&self, node: &str) -> Option<Option<&CommitCoverage>> {
        self.commits.get(node).map(Option::as_ref)
    }

    /// Record the coverage of `node`, unless it was already recorded.
    ///
    /// Returns whether the entry was added.
    pub fn merge(&mut self, node: impl Into<String>, coverage: Option<CommitCoverage>) -> bool {
        let node = node.into();

        if self.commits.contains_key(&node) {
            debug!("coverage of {} already recorded", node);
            return false;
        }

        self.commits.insert(node, coverage);
        true
    }

    /// Revisions of overall reports not analyzed yet, in listing order.
    pub fn pending(&self, reports: &[ReportDescriptor]) -> Vec<String> {
        let mut seen = HashSet::new();

        reports
            .iter()
            .filter(|report| report.is_overall())
            .map(|report| &report.revision)
            .filter(|revision| !self.contains(revision))
            .filter(|revision| seen.insert(revision.as_str()))
            .cloned()
            .collect()
    }

    /// Load the published index, starting empty if it was never published.
    pub async fn load(source: &dyn IIndexSource, codec: &ArchiveCodec) -> Result<Self> {
        let data = match source.fetch().await {
            Ok(data) => data,
            Err(err) if is_not_found(&err) => {
                info!("no previous commit coverage index, starting from scratch");
                return Ok(Self::new());
            }
            Err(err) => return Err(err.context("fetching commit coverage index")),
        };

        let index: Self = codec
            .decompress(data.as_slice())
            .context("decoding commit coverage index")?;

        event!(Event::index_loaded; EventData::Count = index.len() as u64);

        Ok(index)
    }
}

/// One run of the commit coverage pipeline: load the published index, analyze
/// every overall report it doesn't know about, and publish it again.
///
/// Nothing is persisted until every report has been analyzed. A failed run
/// leaves the published index untouched and can simply be repeated.
pub struct CommitCoverageGenerator {
    repository: String,
    source: Box<dyn IIndexSource>,
    store: ReportStore,
    attributor: ChangesetAttributor,
    codec: ArchiveCodec,
    artifacts_dir: Option<PathBuf>,
}

impl CommitCoverageGenerator {
    pub fn new(
        repository: impl Into<String>,
        source: Box<dyn IIndexSource>,
        store: ReportStore,
        attributor: ChangesetAttributor,
        codec: ArchiveCodec,
    ) -> Self {
        Self {
            repository: repository.into(),
            source,
            store,
            attributor,
            codec,
            artifacts_dir: None,
        }
    }

    pub fn with_artifacts_dir(mut self, artifacts_dir: Option<PathBuf>) -> Self {
        self.artifacts_dir = artifacts_dir;
        self
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub async fn run(&self) -> Result<CommitCoverageIndex> {
        let mut index = CommitCoverageIndex::load(self.source.as_ref(), &self.codec).await?;
        let pending = self.discover(&index).await?;

        info!(
            "{} commits already analyzed, {} new reports to analyze",
            index.len(),
            pending.len()
        );

        for (i, revision) in pending.iter().enumerate() {
            info!("analyzing {} ({}/{})", revision, i + 1, pending.len());
            self.analyze(&mut index, revision).await?;
        }

        self.persist(&index).await?;

        Ok(index)
    }

    pub async fn discover(&self, index: &CommitCoverageIndex) -> Result<Vec<String>> {
        let reports = self
            .store
            .list(&self.repository, Some(DEFAULT_FILTER), Some(DEFAULT_FILTER))
            .await?;

        Ok(index.pending(&reports))
    }

    async fn analyze(&self, index: &mut CommitCoverageIndex, revision: &str) -> Result<()> {
        let report = ReportDescriptor::overall(&self.repository, revision);
        let report = self.store.download(&report).await?;

        let attributed = self.attributor.generate(revision, &report).await?;

        for (node, coverage) in attributed {
            if let Some(coverage) = &coverage {
                event!(Event::commit_coverage_analyzed;
                    EventData::Changeset = node.as_str(),
                    EventData::Added = coverage.added,
                    EventData::Covered = coverage.covered,
                    EventData::Unknown = coverage.unknown
                );
            }

            index.merge(node, coverage);
        }

        Ok(())
    }

    async fn persist(&self, index: &CommitCoverageIndex) -> Result<()> {
        if let Some(artifacts_dir) = &self.artifacts_dir {
            let path = artifacts_dir.join(COMMIT_COVERAGE_ARTIFACT);
            self.codec
                .save(&path, index)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }

        self.store
            .upload_commit_coverage(index)
            .await
            .context("publishing commit coverage index")?;

        event!(Event::index_saved; EventData::Count = index.len() as u64);

        Ok(())
    }
}

#[cfg(test)]
mod tests;
