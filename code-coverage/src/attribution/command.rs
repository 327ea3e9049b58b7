// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{path::PathBuf, process::Stdio};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::{fs, process::Command};

use super::{AttributionResults, Changeset, ICoverageAttributor};

/// Delegates coverage attribution to an external helper.
///
/// The helper receives the path of a JSON request file as its last argument
/// and must print the attribution results as JSON on stdout.
#[derive(Clone, Debug)]
pub struct CommandAttributor {
    repository: String,
    program: PathBuf,
    args: Vec<String>,
}

#[derive(Serialize)]
struct AttributionRequest<'a> {
    repository: &'a str,
    revision: &'a str,
    report: &'a Value,
    changesets: &'a [Changeset],
}

impl CommandAttributor {
    pub fn new(repository: impl Into<String>, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            repository: repository.into(),
            program: program.into(),
            args,
        }
    }

    // The request file is removed when the returned handle drops.
    async fn write_request(&self, request: &AttributionRequest<'_>) -> Result<NamedTempFile> {
        let file = NamedTempFile::new().context("creating attribution request file")?;
        let data = serde_json::to_vec(request).context("serializing attribution request")?;
        fs::write(file.path(), data)
            .await
            .context("writing attribution request")?;

        Ok(file)
    }
}

#[async_trait]
impl ICoverageAttributor for CommandAttributor {
    async fn generate(
        &self,
        revision: &str,
        report: &Value,
        changesets: &[Changeset],
    ) -> Result<AttributionResults> {
        let request = AttributionRequest {
            repository: &self.repository,
            revision,
            report,
            changesets,
        };
        let request_file = self.write_request(&request).await?;

        verbose!(
            "running attribution helper {} for {}",
            self.program.display(),
            revision
        );

        let output = Command::new(&self.program)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .args(&self.args)
            .arg(request_file.path())
            .spawn()
            .with_context(|| format!("attribution helper failed to start: {}", self.program.display()))?
            .wait_with_output()
            .await
            .context("attribution helper failed to run")?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "attribution helper {} failed for {} status:{} stdout:{:?} stderr:{:?}",
                self.program.display(),
                revision,
                output.status,
                stdout,
                stderr,
            );
        }

        let results = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("invalid attribution helper output for {}", revision))?;

        Ok(results)
    }
}
