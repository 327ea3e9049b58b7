// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::attribution::double::*;
use crate::attribution::{Changeset, ChangesetCoverage};
use crate::error::DecodeError;
use crate::index::double::IndexSourceDouble;
use crate::storage::double::ObjectStoreDouble;
use crate::storage::ObjectMetadata;
use crate::store::COMMIT_COVERAGE_REPORT;

use super::*;

const REPOSITORY: &str = "mozilla-central";

struct Fixture;

impl Fixture {
    fn codec(&self) -> ArchiveCodec {
        ArchiveCodec::new(1)
    }

    fn report(&self) -> Value {
        json!({
            "name": "",
            "children": { "a.c": { "name": "a.c" }, "b.c": { "name": "b.c" } }
        })
    }

    /// Overall reports for `c1` and `c2`, plus a platform specific one for
    /// `c3`.
    fn objects(&self) -> ObjectStoreDouble {
        let mut objects = ObjectStoreDouble::default();
        let archive = self.codec().compress_json(&self.report()).unwrap();

        for report in [
            ReportDescriptor::overall(REPOSITORY, "c1"),
            ReportDescriptor::overall(REPOSITORY, "c2"),
            ReportDescriptor::new(REPOSITORY, "c3", "linux", DEFAULT_FILTER),
        ] {
            objects.insert(report.name(), archive.clone());
        }

        objects
    }

    fn history(&self) -> RepositoryHistoryDouble {
        RepositoryHistoryDouble::default()
            .with("c1", vec![Changeset::new("c1")])
            .with("c2", vec![Changeset::new("p2"), Changeset::new("c2")])
            .with("c3", vec![Changeset::new("c3")])
    }

    fn attributor(&self) -> CoverageAttributorDouble {
        let mut attributor = CoverageAttributorDouble::default();
        attributor.results.insert(
            "c2".to_owned(),
            serde_json::from_value::<ChangesetCoverage>(json!({
                "paths": {
                    "a.c": { "lines_added": 10, "lines_covered": 7, "lines_unknown": 1 },
                    "b.c": { "lines_added": 5, "lines_covered": 5, "lines_unknown": 0 }
                }
            }))
            .unwrap(),
        );
        attributor.results.insert(
            "c1".to_owned(),
            serde_json::from_value::<ChangesetCoverage>(json!({
                "paths": { "a.c": { "lines_added": 2, "lines_covered": 0, "lines_unknown": 2 } }
            }))
            .unwrap(),
        );
        attributor
    }

    fn generator(
        &self,
        source: IndexSourceDouble,
        objects: ObjectStoreDouble,
    ) -> CommitCoverageGenerator {
        let store = ReportStore::new(Box::new(objects), self.codec());
        let attributor =
            ChangesetAttributor::new(Box::new(self.history()), Box::new(self.attributor()));

        CommitCoverageGenerator::new(REPOSITORY, Box::new(source), store, attributor, self.codec())
    }

    fn coverage(&self, added: u64, covered: u64, unknown: u64) -> CommitCoverage {
        CommitCoverage {
            added,
            covered,
            unknown,
        }
    }
}

fn stored(generator: &CommitCoverageGenerator) -> &ObjectStoreDouble {
    generator.store().objects().downcast_ref().unwrap()
}

fn attributor_calls(generator: &CommitCoverageGenerator) -> Vec<String> {
    let double: &CoverageAttributorDouble = generator.attributor.coverage().downcast_ref().unwrap();
    double.calls.lock().unwrap().clone()
}

#[test]
fn test_pending_skips_analyzed_and_specific_reports() {
    let mut index = CommitCoverageIndex::new();
    index.merge("c1", None);

    let reports = vec![
        ReportDescriptor::overall(REPOSITORY, "c1"),
        ReportDescriptor::overall(REPOSITORY, "c2"),
        ReportDescriptor::new(REPOSITORY, "c3", "linux", DEFAULT_FILTER),
    ];

    assert_eq!(index.pending(&reports), vec!["c2".to_owned()]);
}

#[test]
fn test_pending_keeps_listing_order_without_duplicates() {
    let index = CommitCoverageIndex::new();
    let reports = vec![
        ReportDescriptor::overall(REPOSITORY, "z"),
        ReportDescriptor::overall(REPOSITORY, "a"),
        ReportDescriptor::overall(REPOSITORY, "z"),
        ReportDescriptor::overall(REPOSITORY, "m"),
    ];

    assert_eq!(
        index.pending(&reports),
        vec!["z".to_owned(), "a".to_owned(), "m".to_owned()]
    );
}

#[test]
fn test_merge_keeps_first_entry() {
    let mut index = CommitCoverageIndex::new();

    assert!(index.merge("c1", Some(Fixture.coverage(3, 2, 1))));
    assert!(!index.merge("c1", None));

    assert_eq!(index.get("c1"), Some(Some(&Fixture.coverage(3, 2, 1))));
    assert_eq!(index.get("c2"), None);
}

#[test]
fn test_index_json_shape() -> Result<()> {
    let mut index = CommitCoverageIndex::new();
    index.merge("c1", None);
    index.merge("c2", Some(Fixture.coverage(15, 12, 1)));

    let value = serde_json::to_value(&index)?;
    assert_eq!(
        value,
        json!({"c1": null, "c2": {"added": 15, "covered": 12, "unknown": 1}})
    );

    let parsed: CommitCoverageIndex = serde_json::from_value(value)?;
    assert_eq!(parsed, index);
    Ok(())
}

#[tokio::test]
async fn test_load_missing_index_starts_empty() -> Result<()> {
    let index = CommitCoverageIndex::load(&IndexSourceDouble::Missing, &Fixture.codec()).await?;

    assert!(index.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_load_unavailable_index_fails() {
    let result = CommitCoverageIndex::load(&IndexSourceDouble::Unavailable, &Fixture.codec()).await;

    let err = result.unwrap_err();
    assert!(!crate::error::is_not_found(&err));
    assert!(format!("{:?}", err).contains("503"));
}

#[tokio::test]
async fn test_load_corrupt_index_fails() {
    let source = IndexSourceDouble::Published(b"not zstd".to_vec());
    let err = CommitCoverageIndex::load(&source, &Fixture.codec())
        .await
        .unwrap_err();

    assert!(err.chain().any(|cause| cause.is::<DecodeError>()));
}

#[tokio::test]
async fn test_discover() -> Result<()> {
    let generator = Fixture.generator(IndexSourceDouble::Missing, Fixture.objects());
    let mut index = CommitCoverageIndex::new();
    index.merge("c1", None);

    assert_eq!(generator.discover(&index).await?, vec!["c2".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn test_run_from_scratch() -> Result<()> {
    let generator = Fixture.generator(IndexSourceDouble::Missing, Fixture.objects());

    let index = generator.run().await?;

    assert_eq!(index.len(), 3);
    assert_eq!(index.get("c1"), Some(Some(&Fixture.coverage(2, 0, 2))));
    assert_eq!(index.get("p2"), Some(None));
    assert_eq!(index.get("c2"), Some(Some(&Fixture.coverage(15, 12, 1))));
    assert_eq!(index.get("c3"), None);

    assert_eq!(attributor_calls(&generator), vec!["c1".to_owned(), "c2".to_owned()]);

    let (data, metadata) = stored(&generator).object(COMMIT_COVERAGE_REPORT).unwrap();
    assert_eq!(metadata, ObjectMetadata::zstd_json());
    let published: CommitCoverageIndex = Fixture.codec().decompress(data.as_slice())?;
    assert_eq!(published, index);

    Ok(())
}

#[tokio::test]
async fn test_run_skips_analyzed_changesets() -> Result<()> {
    let mut previous = CommitCoverageIndex::new();
    previous.merge("c1", Some(Fixture.coverage(1, 1, 0)));
    let source = IndexSourceDouble::Published(Fixture.codec().compress_json(&previous)?);

    let generator = Fixture.generator(source, Fixture.objects());
    let index = generator.run().await?;

    assert_eq!(attributor_calls(&generator), vec!["c2".to_owned()]);
    assert_eq!(index.get("c1"), Some(Some(&Fixture.coverage(1, 1, 0))));
    assert_eq!(index.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_run_is_idempotent() -> Result<()> {
    let first = Fixture.generator(IndexSourceDouble::Missing, Fixture.objects());
    let first_index = first.run().await?;

    let objects = stored(&first).clone();
    let (published, _) = objects.object(COMMIT_COVERAGE_REPORT).unwrap();

    let second = Fixture.generator(IndexSourceDouble::Published(published), objects);
    let second_index = second.run().await?;

    assert_eq!(second_index, first_index);
    assert!(attributor_calls(&second).is_empty());

    let (republished, _) = stored(&second).object(COMMIT_COVERAGE_REPORT).unwrap();
    let republished: CommitCoverageIndex = Fixture.codec().decompress(republished.as_slice())?;
    assert_eq!(republished, first_index);
    Ok(())
}

#[tokio::test]
async fn test_run_download_failure_persists_nothing() {
    let mut objects = Fixture.objects();
    objects
        .broken
        .insert(ReportDescriptor::overall(REPOSITORY, "c2").name());

    let generator = Fixture.generator(IndexSourceDouble::Missing, objects);
    let result = generator.run().await;

    assert!(result.is_err());
    assert!(!stored(&generator)
        .written()
        .contains(&COMMIT_COVERAGE_REPORT.to_owned()));
}

#[tokio::test]
async fn test_run_listing_failure_persists_nothing() {
    let mut objects = Fixture.objects();
    objects.fail_list = true;

    let generator = Fixture.generator(IndexSourceDouble::Missing, objects);

    assert!(generator.run().await.is_err());
    assert!(stored(&generator).written().is_empty());
}

#[tokio::test]
async fn test_run_writes_artifact() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let generator = Fixture
        .generator(IndexSourceDouble::Missing, Fixture.objects())
        .with_artifacts_dir(Some(dir.path().to_owned()));

    let index = generator.run().await?;

    let artifact: CommitCoverageIndex = Fixture
        .codec()
        .load(dir.path().join(COMMIT_COVERAGE_ARTIFACT))?;
    assert_eq!(artifact, index);
    Ok(())
}

#[tokio::test]
async fn test_run_coverage_overflow_persists_nothing() {
    let mut attributor = Fixture.attributor();
    attributor.results.insert(
        "c2".to_owned(),
        serde_json::from_value::<ChangesetCoverage>(json!({
            "paths": {
                "a.c": { "lines_added": u64::MAX },
                "b.c": { "lines_added": 1 }
            }
        }))
        .unwrap(),
    );

    let store = ReportStore::new(Box::new(Fixture.objects()), Fixture.codec());
    let attributor = ChangesetAttributor::new(Box::new(Fixture.history()), Box::new(attributor));
    let generator = CommitCoverageGenerator::new(
        REPOSITORY,
        Box::new(IndexSourceDouble::Missing),
        store,
        attributor,
        Fixture.codec(),
    );

    let err = generator.run().await.unwrap_err();

    assert!(format!("{:?}", err).contains("lines_added"));
    assert!(stored(&generator).written().is_empty());
}
