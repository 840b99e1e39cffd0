// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use class_files::ClassId;
use pretty_assertions::assert_eq;

use super::*;
use crate::binary::{ExecutionData, SessionInfo};

fn store(entries: &[(u64, &[bool])]) -> ExecutionDataStore {
    let mut store = ExecutionDataStore::default();

    for (id, probes) in entries {
        let data = ExecutionData::from_bools(ClassId(*id), format!("C{id}"), probes);
        store.entries.insert(data.id, data);
    }

    store
}

fn execution(id: &str, entries: &[(u64, &[bool])]) -> TestExecution {
    let dump = ExecutionDataDump {
        session: SessionInfo::new(id, 0, 0),
        store: store(entries),
    };

    TestExecution::from_dump(dump)
}

fn ids(merged: &MergedTests) -> Vec<&str> {
    merged.tests.iter().map(|t| t.id.as_str()).collect()
}

#[test]
fn test_kind_from_test_id() {
    assert_eq!(
        ExecutionKind::from_test_id("com/foo/BarTest#beforeClass"),
        ExecutionKind::BeforeClass {
            class: "com/foo/BarTest".into()
        }
    );
    assert_eq!(
        ExecutionKind::from_test_id("com/foo/BarTest#afterClass"),
        ExecutionKind::AfterClass {
            class: "com/foo/BarTest".into()
        }
    );
    assert_eq!(
        ExecutionKind::from_test_id("com/foo/BarTest/test1"),
        ExecutionKind::Test {
            class: "com/foo/BarTest".into()
        }
    );
    assert_eq!(
        ExecutionKind::from_test_id("Class#test1"),
        ExecutionKind::Test {
            class: "Class".into()
        }
    );
    assert_eq!(
        ExecutionKind::from_test_id("standalone"),
        ExecutionKind::Test { class: "".into() }
    );
}

#[test]
fn test_outcome_severity() -> Result<()> {
    let mut result = TestResult::passed();

    result.absorb(TestResult::new(TestOutcome::Skipped, None));
    assert_eq!(result.outcome, TestOutcome::Skipped);

    result.absorb(TestResult::new(TestOutcome::Error, Some("boom".to_owned())));
    result.absorb(TestResult::new(TestOutcome::Failure, Some("assert".to_owned())));
    assert_eq!(result.outcome, TestOutcome::Error);
    assert_eq!(result.message.as_deref(), Some("boom\nassert"));

    assert_eq!("failure".parse::<TestOutcome>()?, TestOutcome::Failure);
    assert!("flaky".parse::<TestOutcome>().is_err());
    assert_eq!(TestOutcome::Ignored.to_string(), "IGNORED");

    Ok(())
}

#[test]
fn test_same_id_is_merged() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("Class#T", &[(1, &[true, false])]));
    merger.push(execution("Class#T", &[(1, &[false, true])]));

    let merged = merger.finish();

    assert_eq!(ids(&merged), ["Class#T"]);
    assert_eq!(merged.tests[0].store, store(&[(1, &[true, true])]));
    assert!(merged.unresolved.is_empty());
}

#[test]
fn test_durations_are_summed() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("Class#T", &[]).with_duration(Duration::from_millis(100)));
    merger.push(execution("Class#T", &[]).with_duration(Duration::from_millis(25)));

    let merged = merger.finish();
    assert_eq!(merged.tests[0].duration, Duration::from_millis(125));
}

#[test]
fn test_duration_falls_back_to_session() {
    let dump = ExecutionDataDump::new(SessionInfo::new("Class#T", 1_000, 1_250));

    let mut merger = TestwiseMerger::new();
    merger.push(TestExecution::from_dump(dump));

    assert_eq!(merger.finish().tests[0].duration, Duration::from_millis(250));
}

#[test]
fn test_before_class_folds_into_first_test() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("Class#beforeClass", &[(1, &[true, false, false])]));
    merger.push(execution("Class#test1", &[(1, &[false, true, false])]));
    merger.push(execution("Class#test2", &[(1, &[false, false, true])]));

    let merged = merger.finish();

    assert_eq!(ids(&merged), ["Class#test1", "Class#test2"]);
    assert_eq!(merged.tests[0].store, store(&[(1, &[true, true, false])]));
    assert_eq!(merged.tests[1].store, store(&[(1, &[false, false, true])]));
}

#[test]
fn test_before_class_failure_is_carried() {
    let mut merger = TestwiseMerger::new();

    let setup = execution("Class#beforeClass", &[]).with_result(TestResult::new(
        TestOutcome::Error,
        Some("setup failed".to_owned()),
    ));
    merger.push(setup);
    merger.push(execution("Class#test1", &[]));

    let merged = merger.finish();

    assert_eq!(merged.tests[0].result.outcome, TestOutcome::Error);
    assert_eq!(merged.tests[0].result.message.as_deref(), Some("setup failed"));
}

#[test]
fn test_after_class_folds_into_last_test() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("Class#test1", &[(1, &[true, false, false])]));
    merger.push(execution("Class#test2", &[(1, &[false, true, false])]));

    let teardown = execution("Class#afterClass", &[(1, &[false, false, true])])
        .with_result(TestResult::new(TestOutcome::Failure, Some("cleanup".to_owned())))
        .with_duration(Duration::from_secs(3));
    merger.push(teardown);

    let merged = merger.finish();

    assert_eq!(ids(&merged), ["Class#test1", "Class#test2", "Class#afterClass"]);
    assert_eq!(merged.tests[0].store, store(&[(1, &[true, false, false])]));
    assert_eq!(merged.tests[1].store, store(&[(1, &[false, true, true])]));

    // The last real test keeps its own outcome.
    assert_eq!(merged.tests[1].result, TestResult::passed());

    let pseudo = &merged.tests[2];
    assert_eq!(pseudo.duration, Duration::ZERO);
    assert_eq!(pseudo.store, store(&[(1, &[false, false, true])]));
    assert_eq!(pseudo.result.outcome, TestOutcome::Failure);
    assert_eq!(pseudo.result.message.as_deref(), Some("cleanup"));

    assert!(merged.unresolved.is_empty());
}

#[test]
fn test_hooks_only_affect_their_class() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("A#beforeClass", &[(1, &[true])]));
    merger.push(execution("B#test1", &[(2, &[true])]));
    merger.push(execution("A#test1", &[(3, &[true])]));

    let merged = merger.finish();

    assert_eq!(ids(&merged), ["B#test1", "A#test1"]);
    assert_eq!(merged.tests[0].store, store(&[(2, &[true])]));
    assert_eq!(merged.tests[1].store, store(&[(1, &[true]), (3, &[true])]));
}

#[test]
fn test_unresolved_after_class() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("Class#afterClass", &[(1, &[true])]));

    let merged = merger.finish();

    assert_eq!(ids(&merged), ["Class#afterClass"]);
    assert_eq!(merged.tests[0].store, store(&[(1, &[true])]));
    assert_eq!(
        merged.unresolved,
        [UnresolvedHook {
            id: "Class#afterClass".into(),
            kind: ExecutionKind::AfterClass {
                class: "Class".into()
            },
        }]
    );
}

#[test]
fn test_unresolved_before_class() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("Other#test1", &[]));
    merger.push(execution("Class#beforeClass", &[(1, &[true])]));

    let merged = merger.finish();

    assert_eq!(ids(&merged), ["Other#test1", "Class#beforeClass"]);
    assert_eq!(merged.tests[1].duration, Duration::ZERO);
    assert_eq!(merged.unresolved.len(), 1);
    assert_eq!(merged.unresolved[0].id, "Class#beforeClass");
}

#[test]
fn test_empty_id_is_skipped() {
    let mut merger = TestwiseMerger::new();

    merger.push(execution("", &[(1, &[true])]));
    merger.push(execution("Class#test1", &[]));

    let merged = merger.finish();
    assert_eq!(ids(&merged), ["Class#test1"]);
}

#[test]
fn test_test_details_json() -> Result<()> {
    let details = TestDetails {
        external_id: "com.foo.BarTest:test1".into(),
        internal_id: "com/foo/BarTest/test1".into(),
        source_path: Some("com/foo/BarTest.java".into()),
        display_name: "test1()".into(),
        module: None,
    };

    let json = serde_json::to_value(&details)?;
    assert_eq!(
        json,
        serde_json::json!({
            "externalId": "com.foo.BarTest:test1",
            "internalId": "com/foo/BarTest/test1",
            "sourcePath": "com/foo/BarTest.java",
            "displayName": "test1()",
        })
    );

    let details = details.with_module(Some("core"));
    assert_eq!(details.module.as_deref(), Some("core"));
    assert_eq!(
        details.kind(),
        ExecutionKind::Test {
            class: "com/foo/BarTest".into()
        }
    );

    Ok(())
}
