// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::Result;
use class_files::{ClassIndex, ClassResolver, ResolutionError};
use coverage::binary::ExecutionDataStore;
use coverage::source::SourceCoverage;
use coverage::testwise::{TestExecution, TestwiseMerger, UnresolvedHook};
use coverage::{AnalysisCache, ClassAnalyzer, CoverageBuilder};
use testwise_file_format::exec;
use testwise_file_format::testwise::{TestwiseReportWriter, WriteError};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReportSummary {
    /// Number of `<test>` entries written.
    pub tests: usize,

    /// Hooks reported on their own because no test of their class could absorb them.
    pub unresolved: Vec<UnresolvedHook>,
}

/// Turns test executions into testwise coverage reports.
///
/// Owns the resolved classes and the analysis cache. Both live as long as the
/// generator, so models computed for one report are reused by the next.
pub struct TestwiseReportGenerator {
    builder: CoverageBuilder,
}

impl TestwiseReportGenerator {
    pub fn new(config: &crate::Config, analyzer: impl ClassAnalyzer + 'static) -> Result<Self> {
        config.validate()?;
        let generator = Self::from_resolver(config.resolver()?, analyzer)?;

        Ok(generator)
    }

    /// Resolve every class up front. Fails on the first duplicate conflict.
    pub fn from_resolver(
        resolver: ClassResolver,
        analyzer: impl ClassAnalyzer + 'static,
    ) -> Result<Self, ResolutionError> {
        let started = Instant::now();
        let classes = ClassIndex::build(resolver.resolve()?)?;

        info!(
            "resolved {} classes in {:?}",
            classes.len(),
            started.elapsed()
        );

        let cache = AnalysisCache::new(analyzer);

        Ok(Self {
            builder: CoverageBuilder::new(classes, cache),
        })
    }

    /// Resolve classes on a worker thread.
    pub fn spawn<A>(config: crate::Config, analyzer: A) -> JoinHandle<Result<Self>>
    where
        A: ClassAnalyzer + 'static,
    {
        thread::spawn(move || Self::new(&config, analyzer))
    }

    pub fn classes(&self) -> &ClassIndex {
        self.builder.classes()
    }

    pub fn cache(&self) -> &AnalysisCache {
        self.builder.cache()
    }

    /// Lines covered by `store`, regardless of which test recorded it.
    pub fn source_coverage(&self, store: &ExecutionDataStore) -> SourceCoverage {
        self.builder.source_coverage(store)
    }

    /// Merge `executions` into logical tests and stream their coverage to `output`.
    ///
    /// Executions must be in arrival order.
    pub fn generate<W: Write>(
        &self,
        executions: impl IntoIterator<Item = TestExecution>,
        output: W,
    ) -> Result<ReportSummary, WriteError> {
        let started = Instant::now();

        let mut merger = TestwiseMerger::new();
        for execution in executions {
            merger.push(execution);
        }
        let merged = merger.finish();

        let mut writer = TestwiseReportWriter::new(output);
        writer.begin()?;

        for test in merged.tests {
            writer.write_test(self.builder.build(test))?;
        }

        writer.close()?;

        let summary = ReportSummary {
            tests: writer.tests_written(),
            unresolved: merged.unresolved,
        };

        info!(
            "wrote testwise coverage for {} tests in {:?} ({} classes analyzed)",
            summary.tests,
            started.elapsed(),
            self.cache().analyzed()
        );

        if !summary.unresolved.is_empty() {
            warn!(
                "{} hooks could not be attributed to a test",
                summary.unresolved.len()
            );
        }

        Ok(summary)
    }

    pub fn generate_to_string(
        &self,
        executions: impl IntoIterator<Item = TestExecution>,
    ) -> Result<(String, ReportSummary)> {
        let mut data = Vec::new();
        let summary = self.generate(executions, &mut data)?;

        Ok((String::from_utf8(data)?, summary))
    }

    /// Convert a whole exec payload. Each session becomes an execution keyed by
    /// its session id.
    pub fn convert_exec<W: Write>(
        &self,
        data: &[u8],
        provenance: &str,
        output: W,
    ) -> Result<ReportSummary> {
        let dumps = exec::read_dumps(data, provenance)?;
        let executions = dumps.into_iter().map(TestExecution::from_dump);

        Ok(self.generate(executions, output)?)
    }
}
