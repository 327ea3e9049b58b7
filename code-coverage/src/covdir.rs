// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Line counters carried by every node of a covdir report.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct LineCounters {
    #[serde(default, alias = "linesTotal")]
    pub lines_added: u64,

    #[serde(default, alias = "linesCovered")]
    pub lines_covered: u64,

    #[serde(default)]
    pub lines_unknown: u64,
}

/// A node of a covdir report: either a directory with at least one child, or
/// a file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(from = "CovdirNodeJson")]
pub enum CovdirNode {
    Directory {
        name: String,
        counters: LineCounters,
        children: BTreeMap<String, CovdirNode>,
    },
    File {
        name: String,
        counters: LineCounters,
    },
}

// Wire shape. A directory is any node with a non-empty `children` object.
#[derive(Deserialize)]
struct CovdirNodeJson {
    #[serde(default)]
    name: String,

    #[serde(default)]
    children: BTreeMap<String, CovdirNodeJson>,

    #[serde(flatten)]
    counters: LineCounters,
}

impl From<CovdirNodeJson> for CovdirNode {
    fn from(json: CovdirNodeJson) -> Self {
        if json.children.is_empty() {
            return CovdirNode::File {
                name: json.name,
                counters: json.counters,
            };
        }

        let children = json
            .children
            .into_iter()
            .map(|(key, child)| (key, child.into()))
            .collect();

        CovdirNode::Directory {
            name: json.name,
            counters: json.counters,
            children,
        }
    }
}

impl CovdirNode {
    pub fn from_value(report: Value) -> Result<Self> {
        serde_json::from_value(report).context("invalid covdir report")
    }

    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context("invalid covdir report")
    }

    pub fn name(&self) -> &str {
        match self {
            CovdirNode::Directory { name, .. } | CovdirNode::File { name, .. } => name,
        }
    }

    pub fn counters(&self) -> &LineCounters {
        match self {
            CovdirNode::Directory { counters, .. } | CovdirNode::File { counters, .. } => counters,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, CovdirNode::File { .. })
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            CovdirNode::File { .. } => 1,
            CovdirNode::Directory { children, .. } => {
                children.values().map(CovdirNode::leaf_count).sum()
            }
        }
    }

    /// Full path of every file in the tree, depth-first.
    ///
    /// The root's own name is the first path component, and an empty name adds
    /// no component.
    pub fn flatten(&self) -> Vec<String> {
        let mut paths = vec![];
        self.extract("", &mut paths);
        paths
    }

    fn extract(&self, base_path: &str, paths: &mut Vec<String>) {
        let path = join(base_path, self.name());

        match self {
            CovdirNode::File { .. } => paths.push(path),
            CovdirNode::Directory { children, .. } => {
                for child in children.values() {
                    child.extract(&path, paths);
                }
            }
        }
    }
}

/// All file paths listed by a covdir report.
pub fn covdir_paths(report: Value) -> Result<Vec<String>> {
    Ok(CovdirNode::from_value(report)?.flatten())
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{}", base, name)
    }
}
