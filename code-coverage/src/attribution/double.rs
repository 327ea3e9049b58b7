// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Mutex;

use super::*;

#[derive(Clone, Debug, Default)]
pub struct RepositoryHistoryDouble {
    pub relevance: HashMap<String, Vec<Changeset>>,
}

impl RepositoryHistoryDouble {
    pub fn with(mut self, revision: &str, changesets: Vec<Changeset>) -> Self {
        self.relevance.insert(revision.to_owned(), changesets);
        self
    }
}

#[async_trait]
impl IRepositoryHistory for RepositoryHistoryDouble {
    async fn relevant_changesets(&self, revision: &str) -> Result<Vec<Changeset>> {
        self.relevance
            .get(revision)
            .cloned()
            .ok_or_else(|| format_err!("unknown revision {}", revision))
    }
}

#[derive(Debug, Default)]
pub struct CoverageAttributorDouble {
    pub results: AttributionResults,
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ICoverageAttributor for CoverageAttributorDouble {
    async fn generate(
        &self,
        revision: &str,
        _report: &Value,
        changesets: &[Changeset],
    ) -> Result<AttributionResults> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(revision.to_owned());
        }

        Ok(changesets
            .iter()
            .filter_map(|changeset| {
                self.results
                    .get(&changeset.node)
                    .map(|coverage| (changeset.node.clone(), coverage.clone()))
            })
            .collect())
    }
}
