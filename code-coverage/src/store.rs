// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use anyhow::{Context, Result};
use coverage_telemetry::{Event, EventData};
use serde::Serialize;
use serde_json::Value;

use crate::archive::ArchiveCodec;
use crate::commit_coverage::CommitCoverageIndex;
use crate::storage::{IObjectStore, ObjectMetadata, StoredObject};

/// Platform or suite value of the aggregate ("overall") report.
pub const DEFAULT_FILTER: &str = "-";

/// Latest zero coverage report, overwritten by every run.
pub const ZERO_COVERAGE_REPORT: &str = "zero_coverage_report.json.zstd";

/// Latest commit coverage index, overwritten by every run.
pub const COMMIT_COVERAGE_REPORT: &str = "commit_coverage.json";

const REPORT_EXTENSION: &str = ".json.zstd";

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ReportDescriptor {
    pub repository: String,
    pub revision: String,
    pub platform: String,
    pub suite: String,
}

impl ReportDescriptor {
    pub fn new(
        repository: impl Into<String>,
        revision: impl Into<String>,
        platform: impl Into<String>,
        suite: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            revision: revision.into(),
            platform: platform.into(),
            suite: suite.into(),
        }
    }

    pub fn overall(repository: impl Into<String>, revision: impl Into<String>) -> Self {
        Self::new(repository, revision, DEFAULT_FILTER, DEFAULT_FILTER)
    }

    pub fn is_overall(&self) -> bool {
        self.platform == DEFAULT_FILTER && self.suite == DEFAULT_FILTER
    }

    /// Object name of the report, `{repository}/{revision}/{platform}:{suite}.json.zstd`.
    pub fn name(&self) -> String {
        format!(
            "{}/{}/{}:{}{}",
            self.repository, self.revision, self.platform, self.suite, REPORT_EXTENSION
        )
    }

    /// Inverse of `name()` for objects listed under `repository`.
    ///
    /// Repository names may themselves contain `/`, so the repository is given
    /// rather than parsed.
    pub fn parse(repository: &str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(repository)?.strip_prefix('/')?;
        let (revision, file) = rest.split_once('/')?;
        let (platform, suite) = file.strip_suffix(REPORT_EXTENSION)?.split_once(':')?;

        if revision.is_empty() || platform.is_empty() || suite.is_empty() {
            return None;
        }

        Some(Self::new(repository, revision, platform, suite))
    }
}

impl fmt::Display for ReportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coverage reports stored as zstd-compressed JSON objects.
pub struct ReportStore {
    objects: Box<dyn IObjectStore>,
    codec: ArchiveCodec,
}

impl ReportStore {
    pub fn new(objects: Box<dyn IObjectStore>, codec: ArchiveCodec) -> Self {
        Self { objects, codec }
    }

    pub fn objects(&self) -> &dyn IObjectStore {
        self.objects.as_ref()
    }

    pub async fn exists(&self, report: &ReportDescriptor) -> Result<bool> {
        self.objects
            .exists(&report.name())
            .await
            .with_context(|| format!("checking for report {}", report))
    }

    /// Compress and store a raw covdir report. Overwrites any previous upload.
    pub async fn upload(&self, report: &ReportDescriptor, data: &[u8]) -> Result<StoredObject> {
        let archive = self.codec.compress_bytes(data)?;
        self.put_archive(&report.name(), archive).await
    }

    pub async fn upload_zero_coverage(&self, data: &[u8]) -> Result<StoredObject> {
        let archive = self.codec.compress_bytes(data)?;
        self.put_archive(ZERO_COVERAGE_REPORT, archive).await
    }

    pub async fn upload_json<T>(&self, name: &str, value: &T) -> Result<StoredObject>
    where
        T: Serialize + ?Sized,
    {
        let archive = self.codec.compress_json(value)?;
        self.put_archive(name, archive).await
    }

    /// Publish the commit coverage index under its fixed key.
    pub async fn upload_commit_coverage(
        &self,
        index: &CommitCoverageIndex,
    ) -> Result<StoredObject> {
        self.upload_json(COMMIT_COVERAGE_REPORT, index).await
    }

    pub async fn download(&self, report: &ReportDescriptor) -> Result<Value> {
        let name = report.name();
        let archive = self
            .objects
            .get(&name)
            .await
            .with_context(|| format!("downloading report {}", name))?;

        let value = self
            .codec
            .decompress(archive.as_slice())
            .with_context(|| format!("decoding report {}", name))?;

        Ok(value)
    }

    /// Reports stored for `repository`, optionally restricted to one platform
    /// and/or suite.
    pub async fn list(
        &self,
        repository: &str,
        platform: Option<&str>,
        suite: Option<&str>,
    ) -> Result<Vec<ReportDescriptor>> {
        let prefix = format!("{}/", repository);
        let names = self
            .objects
            .list(&prefix)
            .await
            .with_context(|| format!("listing reports for {}", repository))?;

        let mut reports = vec![];
        for name in names {
            let report = match ReportDescriptor::parse(repository, &name) {
                Some(report) => report,
                None => {
                    debug!("skipping non-report object {}", name);
                    continue;
                }
            };

            if platform.map_or(true, |p| p == report.platform)
                && suite.map_or(true, |s| s == report.suite)
            {
                reports.push(report);
            }
        }

        Ok(reports)
    }

    async fn put_archive(&self, name: &str, archive: Vec<u8>) -> Result<StoredObject> {
        let object = self
            .objects
            .put(name, archive, &ObjectMetadata::zstd_json())
            .await
            .with_context(|| format!("uploading {}", name))?;

        info!("uploaded {}", object);
        event!(Event::report_uploaded; EventData::Path = name);

        Ok(object)
    }
}
