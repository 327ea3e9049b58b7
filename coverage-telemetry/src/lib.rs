// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

pub use log;

#[allow(non_camel_case_types)]
#[derive(Clone, Debug)]
pub enum Event {
    index_loaded,
    index_saved,
    report_uploaded,
    report_ingested,
    ingestion_failed,
    commit_coverage_analyzed,
    commit_coverage_missing,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::index_loaded => "index_loaded",
            Self::index_saved => "index_saved",
            Self::report_uploaded => "report_uploaded",
            Self::report_ingested => "report_ingested",
            Self::ingestion_failed => "ingestion_failed",
            Self::commit_coverage_analyzed => "commit_coverage_analyzed",
            Self::commit_coverage_missing => "commit_coverage_missing",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventData {
    Repository(String),
    Revision(String),
    Changeset(String),
    Platform(String),
    Suite(String),
    Path(String),
    Count(u64),
    Added(u64),
    Covered(u64),
    Unknown(u64),
    Attempts(u64),
}

impl EventData {
    pub fn as_values(&self) -> (&str, String) {
        match self {
            Self::Repository(x) => ("repository", x.to_owned()),
            Self::Revision(x) => ("revision", x.to_owned()),
            Self::Changeset(x) => ("changeset", x.to_owned()),
            Self::Platform(x) => ("platform", x.to_owned()),
            Self::Suite(x) => ("suite", x.to_owned()),
            Self::Path(x) => ("path", x.to_owned()),
            Self::Count(x) => ("count", x.to_string()),
            Self::Added(x) => ("added", x.to_string()),
            Self::Covered(x) => ("covered", x.to_string()),
            Self::Unknown(x) => ("unknown", x.to_string()),
            Self::Attempts(x) => ("attempts", x.to_string()),
        }
    }
}

impl fmt::Display for EventData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (name, value) = self.as_values();
        write!(f, "{}:{}", name, value)
    }
}

pub fn format_events(events: &[EventData]) -> String {
    events
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<String>>()
        .join(" ")
}

#[macro_export]
macro_rules! log_events {
    ($name: expr; $events: expr) => {{
        $crate::log::info!("{} {}", $name.as_str(), $crate::format_events(&$events));
    }};
}

#[macro_export]
macro_rules! event {
    ($name: expr ; $($k: path = $v: expr),*) => {{
        let mut events: Vec<$crate::EventData> = Vec::new();

        $({
            events.push($k(From::from($v)));
        })*;

        $crate::log_events!($name; events);
    }};
}

#[macro_export]
macro_rules! verbose {
    ($($arg: tt)+) => {{
        $crate::log::trace!($($arg)+);
    }}
}

#[macro_export]
macro_rules! debug {
    ($($arg: tt)+) => {{
        $crate::log::debug!($($arg)+);
    }}
}

#[macro_export]
macro_rules! info {
    ($($arg: tt)+) => {{
        $crate::log::info!($($arg)+);
    }}
}

#[macro_export]
macro_rules! warn {
    ($($arg: tt)+) => {{
        $crate::log::warn!($($arg)+);
    }}
}

#[macro_export]
macro_rules! error {
    ($($arg: tt)+) => {{
        $crate::log::error!($($arg)+);
    }}
}
