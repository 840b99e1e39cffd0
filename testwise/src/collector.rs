// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::Result;
use coverage::binary::{ExecutionDataDump, ExecutionDataStore, SessionInfo, SessionInfoStore};
use coverage::testwise::{TestDetails, TestExecution, TestResult};
use testwise_file_format::exec;
use testwise_file_format::junit::{JUnitReport, JUnitTestCase};
use testwise_file_format::line_coverage::LineCoverageReport;
use testwise_file_format::test_list::TestListJson;
use testwise_file_format::testwise::WriteError;

use crate::generator::{ReportSummary, TestwiseReportGenerator};

/// Receives test lifecycle events. Implemented by every collector.
///
/// Callbacks may arrive concurrently from several test threads.
pub trait TestListener: Send + Sync {
    /// `dump` is the exec payload recorded since the previous event, i.e.
    /// between tests.
    fn on_test_start(&self, test: &TestDetails, dump: &[u8]);

    /// `dump` is the exec payload recorded since the test started.
    fn on_test_finish(&self, test: &TestDetails, result: &TestResult, dump: &[u8]);
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestEvent {
    Started {
        test: TestDetails,
        dump: Vec<u8>,
    },
    Finished {
        test: TestDetails,
        result: TestResult,
        dump: Vec<u8>,
    },
}

/// Produces test lifecycle events, e.g. from a test framework integration.
pub trait TestEventSource {
    fn next_event(&mut self) -> Option<TestEvent>;
}

impl<I> TestEventSource for I
where
    I: Iterator<Item = TestEvent>,
{
    fn next_event(&mut self) -> Option<TestEvent> {
        self.next()
    }
}

/// Forward every event of `source` to each listener, in order. Returns the
/// number of events forwarded.
pub fn dispatch(source: &mut impl TestEventSource, listeners: &[&dyn TestListener]) -> usize {
    let mut count = 0;

    while let Some(event) = source.next_event() {
        match &event {
            TestEvent::Started { test, dump } => {
                for listener in listeners {
                    listener.on_test_start(test, dump);
                }
            }
            TestEvent::Finished { test, result, dump } => {
                for listener in listeners {
                    listener.on_test_finish(test, result, dump);
                }
            }
        }

        count += 1;
    }

    count
}

#[derive(Default)]
struct CollectorState {
    started: HashMap<String, Instant>,
    executions: Vec<TestExecution>,
}

/// Buffers finished tests with their coverage until the next dump.
#[derive(Default)]
pub struct TestwiseCoverageCollector {
    state: Mutex<CollectorState>,
}

impl TestwiseCoverageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions waiting for the next dump.
    pub fn pending(&self) -> usize {
        self.lock().executions.len()
    }

    /// Drain the buffered executions, in arrival order.
    pub fn take(&self) -> Vec<TestExecution> {
        std::mem::take(&mut self.lock().executions)
    }

    /// Write a report of everything collected since the last dump.
    ///
    /// Returns `None` without writing anything when nothing was collected.
    /// The buffer is cleared only when the report was written; after a
    /// `WriteError` the executions are kept for the next dump.
    pub fn dump<W: Write>(
        &self,
        generator: &TestwiseReportGenerator,
        output: W,
    ) -> Result<Option<ReportSummary>, WriteError> {
        let executions = self.take();

        if executions.is_empty() {
            debug!("no test executions to report");
            return Ok(None);
        }

        match generator.generate(executions.iter().cloned(), output) {
            Ok(summary) => Ok(Some(summary)),
            Err(err) => {
                warn!(
                    "unable to write testwise coverage, keeping {} executions for the next dump: {}",
                    executions.len(),
                    err
                );
                self.restore(executions);
                Err(err)
            }
        }
    }

    /// Put drained executions back ahead of any that arrived since.
    fn restore(&self, mut executions: Vec<TestExecution>) {
        let mut state = self.lock();
        executions.append(&mut state.executions);
        state.executions = executions;
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TestListener for TestwiseCoverageCollector {
    /// Coverage recorded between tests belongs to no test and is dropped.
    fn on_test_start(&self, test: &TestDetails, _dump: &[u8]) {
        self.lock()
            .started
            .insert(test.internal_id.clone(), Instant::now());
    }

    fn on_test_finish(&self, test: &TestDetails, result: &TestResult, dump: &[u8]) {
        let id = &test.internal_id;

        let dump = match exec::read_dumps(dump, format!("dump of test {id}")) {
            Ok(dumps) => ExecutionDataDump::combine(id.clone(), dumps),
            Err(err) => {
                warn!("{}; keeping the test without coverage", err);
                ExecutionDataDump::default()
            }
        };

        let mut state = self.lock();

        let mut execution = TestExecution::new(id.clone(), test.kind(), dump)
            .with_result(result.clone());

        if let Some(started) = state.started.remove(id) {
            execution = execution.with_duration(started.elapsed());
        }

        state.executions.push(execution);
    }
}

/// Records the details of every started test for the test list.
pub struct TestDetailsCollector {
    module: Option<String>,
    tests: Mutex<Vec<TestDetails>>,
}

impl TestDetailsCollector {
    /// `module`, if given, replaces the module reported for each test.
    pub fn new(module: Option<String>) -> Self {
        Self {
            module,
            tests: Mutex::default(),
        }
    }

    /// Render the tests seen since the last dump as a JSON test list.
    ///
    /// Returns `None` when no test has started.
    pub fn dump(&self) -> Result<Option<String>> {
        let tests = std::mem::take(&mut *self.tests.lock().unwrap_or_else(PoisonError::into_inner));

        if tests.is_empty() {
            return Ok(None);
        }

        let json = TestListJson::from(tests).to_string_pretty()?;
        Ok(Some(json))
    }
}

impl TestListener for TestDetailsCollector {
    fn on_test_start(&self, test: &TestDetails, _dump: &[u8]) {
        let details = test.clone().with_module(self.module.as_deref());

        self.tests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(details);
    }

    fn on_test_finish(&self, _test: &TestDetails, _result: &TestResult, _dump: &[u8]) {}
}

#[derive(Default)]
struct JUnitState {
    started: HashMap<String, Instant>,
    test_cases: Vec<JUnitTestCase>,
}

/// Records the duration and outcome of every test for a JUnit XML report.
#[derive(Default)]
pub struct JUnitReportCollector {
    state: Mutex<JUnitState>,
}

impl JUnitReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.lock().test_cases.len()
    }

    /// Render the tests finished since the last dump as JUnit XML.
    ///
    /// Returns `None` when no test has finished. The recorded tests are
    /// cleared only when the report was rendered.
    pub fn dump(&self) -> Result<Option<String>> {
        let test_cases = std::mem::take(&mut self.lock().test_cases);

        if test_cases.is_empty() {
            return Ok(None);
        }

        let report = JUnitReport::new(test_cases);

        match report.to_xml() {
            Ok(xml) => Ok(Some(xml)),
            Err(err) => {
                let mut state = self.lock();
                let mut test_cases = report.test_cases;
                test_cases.append(&mut state.test_cases);
                state.test_cases = test_cases;

                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JUnitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TestListener for JUnitReportCollector {
    fn on_test_start(&self, test: &TestDetails, _dump: &[u8]) {
        self.lock()
            .started
            .insert(test.internal_id.clone(), Instant::now());
    }

    fn on_test_finish(&self, test: &TestDetails, result: &TestResult, _dump: &[u8]) {
        let id = &test.internal_id;

        if test.kind().is_hook() {
            debug!("not reporting hook {} as a test case", id);
            return;
        }

        let mut state = self.lock();

        let duration = state
            .started
            .remove(id)
            .map(|started| started.elapsed())
            .unwrap_or_default();

        state
            .test_cases
            .push(JUnitTestCase::new(id, duration, result.clone()));
    }
}

#[derive(Default)]
struct MergedCoverage {
    sessions: SessionInfoStore,
    store: ExecutionDataStore,
}

impl MergedCoverage {
    fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.store.is_empty()
    }

    fn add(&mut self, dump: ExecutionDataDump) {
        self.sessions.add(dump.session);

        for err in self.store.merge(dump.store) {
            warn!("dropping execution data: {}", err);
        }
    }

    fn absorb(&mut self, other: MergedCoverage) {
        for info in other.sessions.infos() {
            self.sessions.add(info.clone());
        }

        for err in self.store.merge(other.store) {
            warn!("dropping execution data: {}", err);
        }
    }
}

/// Merges every dump, including coverage recorded between tests, into a
/// single session for a whole-suite line coverage report.
#[derive(Default)]
pub struct JaCoCoCoverageCollector {
    state: Mutex<MergedCoverage>,
}

impl JaCoCoCoverageCollector {
    /// Id of the session spanning every merged dump.
    pub const SESSION_ID: &'static str = "merged";

    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classes with execution data waiting for the next dump.
    pub fn pending(&self) -> usize {
        self.lock().store.len()
    }

    /// Write the line coverage of everything merged since the last dump.
    ///
    /// Returns the merged session, or `None` without writing anything when
    /// no dump was received. The merged data is cleared only when the report
    /// was written.
    pub fn dump<W: Write>(
        &self,
        generator: &TestwiseReportGenerator,
        output: W,
    ) -> Result<Option<SessionInfo>> {
        let merged = std::mem::take(&mut *self.lock());

        if merged.is_empty() {
            debug!("no execution data to report");
            return Ok(None);
        }

        let session = merged.sessions.merged(Self::SESSION_ID);
        let coverage = generator.source_coverage(&merged.store);

        match LineCoverageReport::new(&session, &coverage).write(output) {
            Ok(()) => {
                info!(
                    "wrote line coverage of {} files from {} sessions",
                    coverage.files.len(),
                    merged.sessions.infos().len()
                );

                Ok(Some(session))
            }
            Err(err) => {
                warn!("unable to write line coverage, keeping it for the next dump: {}", err);
                self.lock().absorb(merged);

                Err(err)
            }
        }
    }

    fn append(&self, dump: &[u8], provenance: String) {
        if dump.is_empty() {
            return;
        }

        match exec::read_dumps(dump, provenance) {
            Ok(dumps) => {
                let mut state = self.lock();

                for dump in dumps {
                    state.add(dump);
                }
            }
            Err(err) => warn!("{}; ignoring its coverage", err),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MergedCoverage> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TestListener for JaCoCoCoverageCollector {
    fn on_test_start(&self, test: &TestDetails, dump: &[u8]) {
        self.append(dump, format!("dump before test {}", test.internal_id));
    }

    fn on_test_finish(&self, test: &TestDetails, _result: &TestResult, dump: &[u8]) {
        self.append(dump, format!("dump of test {}", test.internal_id));
    }
}
