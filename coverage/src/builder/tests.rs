// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use class_files::synth::class_file;
use class_files::Location;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::cache::ClassCoverageModel;
use crate::source::Line;
use crate::testwise::{TestOutcome, TestResult};

const PROBE_LINES: &[&[u32]] = &[&[1, 2], &[2, 3], &[5], &[10, 11, 12]];

fn lines(numbers: &[u32]) -> BTreeSet<Line> {
    numbers.iter().filter_map(|n| Line::new(*n).ok()).collect()
}

fn analyze(class: &ClassEntry) -> Result<ClassCoverageModel> {
    if class.name.ends_with("Broken") {
        bail!("unsupported bytecode");
    }

    let probes = PROBE_LINES.iter().map(|numbers| lines(numbers)).collect();
    Ok(ClassCoverageModel::new(class.source_path(), probes))
}

fn entry(name: &str) -> Result<ClassEntry> {
    let simple = name.rsplit('/').next().unwrap_or(name);
    let source_file = format!("{simple}.java");
    let data = class_file(name, Some(&source_file), "");

    let location = Location::new(format!("/classes/{name}.class"));
    Ok(ClassEntry::parse(location, data.into())?)
}

struct Fixture {
    builder: CoverageBuilder,
    bar: ClassEntry,
    broken: ClassEntry,
}

fn fixture(calls: Arc<AtomicUsize>) -> Result<Fixture> {
    let _ = env_logger::builder().is_test(true).try_init();

    let bar = entry("com/foo/Bar")?;
    let broken = entry("com/foo/Broken")?;

    let mut index = ClassIndex::new();
    index.insert(bar.clone());
    index.insert(broken.clone());

    let cache = AnalysisCache::new(move |class: &ClassEntry| {
        calls.fetch_add(1, Ordering::SeqCst);
        analyze(class)
    });

    Ok(Fixture {
        builder: CoverageBuilder::new(index, cache),
        bar,
        broken,
    })
}

fn hits(class: &ClassEntry, probes: &[bool]) -> ExecutionData {
    ExecutionData::from_bools(class.id, class.name.clone(), probes)
}

fn store(data: impl IntoIterator<Item = ExecutionData>) -> Result<ExecutionDataStore> {
    let mut store = ExecutionDataStore::default();
    for data in data {
        store.put(data)?;
    }
    Ok(store)
}

#[test]
fn test_translates_hits() -> Result<()> {
    let fixture = fixture(Arc::default())?;

    let store = store([hits(&fixture.bar, &[true, true, false, false])])?;
    let coverage = fixture.builder.source_coverage(&store);

    assert_eq!(coverage.files.len(), 1);
    assert_eq!(coverage.files["com/foo/Bar.java"].to_string(), "1-3");

    Ok(())
}

#[test]
fn test_build_keeps_test_metadata() -> Result<()> {
    let fixture = fixture(Arc::default())?;

    let test = LogicalTest {
        id: "com/foo/BarTest/test1".into(),
        result: TestResult::new(TestOutcome::Failure, Some("expected 2".into())),
        duration: Duration::from_millis(125),
        store: store([hits(&fixture.bar, &[false, false, true, true])])?,
    };

    let aggregate = fixture.builder.build(test);

    assert_eq!(aggregate.id, "com/foo/BarTest/test1");
    assert_eq!(aggregate.duration, Duration::from_millis(125));
    assert_eq!(aggregate.result.outcome, TestOutcome::Failure);
    assert_eq!(aggregate.coverage.files["com/foo/Bar.java"].to_string(), "5,10-12");

    Ok(())
}

#[test]
fn test_unhit_classes_are_not_analyzed() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let fixture = fixture(calls.clone())?;

    let store = store([hits(&fixture.bar, &[false; 4])])?;
    let coverage = fixture.builder.source_coverage(&store);

    assert!(coverage.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    Ok(())
}

#[test]
fn test_missing_class_is_omitted() -> Result<()> {
    let fixture = fixture(Arc::default())?;

    let unknown = ExecutionData::from_bools(ClassId(0xdead), "com/foo/Gone", &[true]);
    let store = store([unknown, hits(&fixture.bar, &[false, false, true, false])])?;

    // Twice, to exercise the warn-once path.
    for _ in 0..2 {
        let coverage = fixture.builder.source_coverage(&store);
        assert_eq!(coverage.files.len(), 1);
        assert_eq!(coverage.files["com/foo/Bar.java"].to_string(), "5");
    }

    Ok(())
}

#[test]
fn test_renamed_class_is_omitted() -> Result<()> {
    let fixture = fixture(Arc::default())?;

    let renamed = ExecutionData::from_bools(fixture.bar.id, "com/foo/Other", &[true; 4]);
    let coverage = fixture.builder.source_coverage(&store([renamed])?);

    assert!(coverage.is_empty());

    Ok(())
}

#[test]
fn test_length_mismatch_is_omitted() -> Result<()> {
    let fixture = fixture(Arc::default())?;

    let store = store([hits(&fixture.bar, &[true, true])])?;
    let coverage = fixture.builder.source_coverage(&store);

    assert!(coverage.is_empty());

    Ok(())
}

#[test]
fn test_analysis_failure_is_omitted() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let fixture = fixture(calls.clone())?;

    let store = store([
        hits(&fixture.broken, &[true; 4]),
        hits(&fixture.bar, &[true, false, false, false]),
    ])?;

    let first = fixture.builder.source_coverage(&store);
    let second = fixture.builder.source_coverage(&store);

    assert_eq!(first, second);
    assert_eq!(first.files.len(), 1);
    assert_eq!(first.files["com/foo/Bar.java"].to_string(), "1-2");

    // One analysis per class, failed or not.
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    Ok(())
}

proptest! {
    #[test]
    fn test_covered_lines_come_from_hits(probes in prop::collection::vec(any::<bool>(), 4)) {
        let fixture = fixture(Arc::default()).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let store = store([hits(&fixture.bar, &probes)]).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let coverage = fixture.builder.source_coverage(&store);

        let expected: BTreeSet<Line> = probes
            .iter()
            .zip(PROBE_LINES)
            .filter(|(hit, _)| **hit)
            .flat_map(|(_, numbers)| lines(numbers))
            .collect();

        let actual = coverage
            .files
            .get("com/foo/Bar.java")
            .map(|file| file.lines.clone())
            .unwrap_or_default();

        prop_assert_eq!(actual, expected);
    }
}
