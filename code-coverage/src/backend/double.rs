// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Mutex;

use super::*;

#[derive(Debug, Default)]
pub struct IngestionDouble {
    pub notified: Mutex<Vec<ReportDescriptor>>,
    pub fail: bool,
    pub latest: Value,
}

#[async_trait]
impl IIngestion for IngestionDouble {
    async fn notify(&self, report: &ReportDescriptor) -> Result<()> {
        if let Ok(mut notified) = self.notified.lock() {
            notified.push(report.clone());
        }

        if self.fail {
            return Err(IngestionError {
                repository: report.repository.clone(),
                revision: report.revision.clone(),
                attempts: INGESTION_MAX_ATTEMPTS,
                source: format_err!("500 Internal Server Error"),
            }
            .into());
        }

        Ok(())
    }

    async fn latest(&self, _repository: &str) -> Result<Value> {
        Ok(self.latest.clone())
    }
}
