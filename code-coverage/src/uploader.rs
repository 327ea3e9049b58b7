// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use coverage_telemetry::{Event, EventData};

use crate::backend::IIngestion;
use crate::error::IngestionError;
use crate::storage::StoredObject;
use crate::store::{ReportDescriptor, ReportStore};

/// Stores covdir reports and asks the backend to ingest them.
pub struct CovdirUploader {
    store: ReportStore,
    ingestion: Box<dyn IIngestion>,
}

impl CovdirUploader {
    pub fn new(store: ReportStore, ingestion: Box<dyn IIngestion>) -> Self {
        Self { store, ingestion }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn ingestion(&self) -> &dyn IIngestion {
        self.ingestion.as_ref()
    }

    pub async fn exists(&self, report: &ReportDescriptor) -> Result<bool> {
        self.store.exists(report).await
    }

    /// Upload `data` and trigger its ingestion.
    ///
    /// The report is durable once stored; a failed ingestion is only logged,
    /// since the backend also picks up stored reports on its own.
    pub async fn upload(&self, report: &ReportDescriptor, data: &[u8]) -> Result<StoredObject> {
        let object = self.store.upload(report, data).await?;

        if let Err(err) = self.ingestion.notify(report).await {
            warn!("ingestion of {} failed: {:?}", report, err);
            event!(Event::ingestion_failed;
                EventData::Repository = report.repository.as_str(),
                EventData::Revision = report.revision.as_str(),
                EventData::Platform = report.platform.as_str(),
                EventData::Suite = report.suite.as_str(),
                EventData::Attempts = failed_attempts(&err)
            );
        }

        Ok(object)
    }

    pub async fn upload_zero_coverage(&self, data: &[u8]) -> Result<StoredObject> {
        self.store.upload_zero_coverage(data).await
    }
}

// Errors that are not an `IngestionError` come from a single request.
fn failed_attempts(err: &anyhow::Error) -> u64 {
    err.downcast_ref::<IngestionError>()
        .map_or(1, |err| err.attempts as u64)
}
