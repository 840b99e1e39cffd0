// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::binary::{ExecutionDataDump, ExecutionDataStore};

pub const BEFORE_CLASS_SUFFIX: &str = "#beforeClass";
pub const AFTER_CLASS_SUFFIX: &str = "#afterClass";

/// What produced an execution, with its owning test class.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ExecutionKind {
    Test { class: String },
    BeforeClass { class: String },
    AfterClass { class: String },
}

impl ExecutionKind {
    /// Classify a legacy string test id.
    ///
    /// `<class>#beforeClass` and `<class>#afterClass` are hooks. Anything else
    /// is a real test whose class is the prefix before the last `#` or `/`.
    pub fn from_test_id(id: &str) -> Self {
        if let Some(class) = id.strip_suffix(BEFORE_CLASS_SUFFIX) {
            return Self::BeforeClass {
                class: class.to_owned(),
            };
        }

        if let Some(class) = id.strip_suffix(AFTER_CLASS_SUFFIX) {
            return Self::AfterClass {
                class: class.to_owned(),
            };
        }

        let class = id
            .rfind(|c| c == '#' || c == '/')
            .map(|index| &id[..index])
            .unwrap_or_default();

        Self::Test {
            class: class.to_owned(),
        }
    }

    pub fn class(&self) -> &str {
        match self {
            Self::Test { class } | Self::BeforeClass { class } | Self::AfterClass { class } => {
                class
            }
        }
    }

    pub fn is_hook(&self) -> bool {
        !matches!(self, Self::Test { .. })
    }
}

/// Test outcome, ordered from least to most severe.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestOutcome {
    #[default]
    Passed,
    Ignored,
    Skipped,
    Failure,
    Error,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Ignored => "IGNORED",
            Self::Skipped => "SKIPPED",
            Self::Failure => "FAILURE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let outcome = match s.to_ascii_uppercase().as_str() {
            "PASSED" => Self::Passed,
            "IGNORED" => Self::Ignored,
            "SKIPPED" => Self::Skipped,
            "FAILURE" => Self::Failure,
            "ERROR" => Self::Error,
            _ => bail!("unknown test outcome `{s}`"),
        };

        Ok(outcome)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TestResult {
    pub outcome: TestOutcome,

    /// Diagnostic output, e.g. a failure's stack trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    pub fn new(outcome: TestOutcome, message: Option<String>) -> Self {
        Self { outcome, message }
    }

    pub fn passed() -> Self {
        Self::default()
    }

    /// Keep the most severe outcome and all messages.
    pub fn absorb(&mut self, other: TestResult) {
        self.outcome = self.outcome.max(other.outcome);

        self.message = match (self.message.take(), other.message) {
            (Some(lhs), Some(rhs)) => Some(format!("{lhs}\n{rhs}")),
            (lhs, rhs) => lhs.or(rhs),
        };
    }
}

/// Test metadata as reported by a test framework.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetails {
    /// Framework-facing id, e.g. `com.foo.BarTest:test1`.
    pub external_id: String,

    /// Uniform id used to key coverage, e.g. `com/foo/BarTest/test1`.
    pub internal_id: String,

    pub source_path: Option<String>,
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl TestDetails {
    pub fn new(internal_id: impl Into<String>) -> Self {
        let internal_id = internal_id.into();

        Self {
            external_id: internal_id.clone(),
            display_name: internal_id.clone(),
            internal_id,
            ..Self::default()
        }
    }

    /// Replace the module, if an override is given.
    pub fn with_module(mut self, module: Option<&str>) -> Self {
        if let Some(module) = module {
            self.module = Some(module.to_owned());
        }

        self
    }

    pub fn kind(&self) -> ExecutionKind {
        ExecutionKind::from_test_id(&self.internal_id)
    }
}

/// One finished test or hook, with the coverage recorded while it ran.
#[derive(Clone, Debug)]
pub struct TestExecution {
    pub id: String,
    pub kind: ExecutionKind,
    pub result: TestResult,

    /// Measured duration. Falls back to the session's time span when absent.
    pub duration: Option<Duration>,

    pub dump: ExecutionDataDump,
}

impl TestExecution {
    pub fn new(id: impl Into<String>, kind: ExecutionKind, dump: ExecutionDataDump) -> Self {
        Self {
            id: id.into(),
            kind,
            result: TestResult::passed(),
            duration: None,
            dump,
        }
    }

    /// An execution keyed and classified by the dump's session id.
    pub fn from_dump(dump: ExecutionDataDump) -> Self {
        let id = dump.session.id.clone();
        let kind = ExecutionKind::from_test_id(&id);
        Self::new(id, kind, dump)
    }

    pub fn with_result(mut self, result: TestResult) -> Self {
        self.result = result;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Everything recorded for one test id, with hooks folded in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LogicalTest {
    pub id: String,
    pub result: TestResult,
    pub duration: Duration,
    pub store: ExecutionDataStore,
}

impl LogicalTest {
    fn new(id: String) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    fn absorb_store(&mut self, store: ExecutionDataStore) {
        for err in self.store.merge(store) {
            warn!("dropping execution data for test {}: {}", self.id, err);
        }
    }
}

/// A hook with no test to fold into. Reported as its own entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnresolvedHook {
    pub id: String,
    pub kind: ExecutionKind,
}

#[derive(Clone, Debug, Default)]
pub struct MergedTests {
    /// In order of first appearance.
    pub tests: Vec<LogicalTest>,
    pub unresolved: Vec<UnresolvedHook>,
}

struct PendingHook {
    id: String,
    result: TestResult,
    store: ExecutionDataStore,
}

#[derive(Default)]
struct ClassProgress {
    /// Before-class hooks waiting for the first test of the class.
    pending: Vec<PendingHook>,

    /// Index of the most recent real test of the class.
    last_test: Option<usize>,
}

/// Groups executions into logical tests.
///
/// Executions must be pushed in arrival order.
#[derive(Default)]
pub struct TestwiseMerger {
    tests: Vec<LogicalTest>,
    positions: HashMap<String, usize>,
    classes: HashMap<String, ClassProgress>,
    unresolved: Vec<UnresolvedHook>,
}

impl TestwiseMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, execution: TestExecution) {
        if execution.id.is_empty() {
            debug!("skipping coverage without a test id");
            return;
        }

        let duration = execution
            .duration
            .unwrap_or_else(|| execution.dump.session.duration());

        let TestExecution {
            id,
            kind,
            result,
            dump,
            ..
        } = execution;

        match kind {
            ExecutionKind::Test { class } => {
                let index = self.upsert(id, result, duration, dump.store);

                let progress = self.classes.entry(class).or_default();
                progress.last_test = Some(index);
                let pending = std::mem::take(&mut progress.pending);

                let test = &mut self.tests[index];
                for hook in pending {
                    debug!("folding {} into {}", hook.id, test.id);
                    test.absorb_store(hook.store);
                    test.result.absorb(hook.result);
                }
            }
            ExecutionKind::BeforeClass { class } => {
                self.classes
                    .entry(class)
                    .or_default()
                    .pending
                    .push(PendingHook {
                        id,
                        result,
                        store: dump.store,
                    });
            }
            ExecutionKind::AfterClass { class } => {
                let target = self.classes.get(&class).and_then(|p| p.last_test);

                match target {
                    Some(index) => {
                        let test = &mut self.tests[index];
                        debug!("folding {} into {}", id, test.id);
                        test.absorb_store(dump.store.clone());
                    }
                    None => {
                        warn!(
                            "after-class hook {} has no preceding test in class {}; reporting it on its own",
                            id, class
                        );
                        self.unresolved.push(UnresolvedHook {
                            id: id.clone(),
                            kind: ExecutionKind::AfterClass { class },
                        });
                    }
                }

                self.upsert(id, result, Duration::ZERO, dump.store);
            }
        }
    }

    pub fn finish(mut self) -> MergedTests {
        // Sorted so unresolved hooks are reported deterministically.
        let classes: BTreeMap<_, _> = std::mem::take(&mut self.classes).into_iter().collect();

        for (class, progress) in classes {
            for hook in progress.pending {
                warn!(
                    "before-class hook {} has no following test in class {}; reporting it on its own",
                    hook.id, class
                );
                self.unresolved.push(UnresolvedHook {
                    id: hook.id.clone(),
                    kind: ExecutionKind::BeforeClass {
                        class: class.clone(),
                    },
                });
                self.upsert(hook.id, hook.result, Duration::ZERO, hook.store);
            }
        }

        MergedTests {
            tests: self.tests,
            unresolved: self.unresolved,
        }
    }

    fn upsert(
        &mut self,
        id: String,
        result: TestResult,
        duration: Duration,
        store: ExecutionDataStore,
    ) -> usize {
        let index = match self.positions.get(&id) {
            Some(index) => *index,
            None => {
                let index = self.tests.len();
                self.positions.insert(id.clone(), index);
                self.tests.push(LogicalTest::new(id));
                index
            }
        };

        let test = &mut self.tests[index];
        test.absorb_store(store);
        test.result.absorb(result);
        test.duration += duration;

        index
    }
}

#[cfg(test)]
mod tests;
