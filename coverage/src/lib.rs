// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[macro_use]
extern crate log;

pub mod binary;
pub mod builder;
pub mod cache;
pub mod report;
pub mod source;
pub mod testwise;

pub use crate::binary::{
    ExecutionData, ExecutionDataDump, ExecutionDataStore, SessionInfo, SessionInfoStore,
};
pub use crate::builder::CoverageBuilder;
pub use crate::cache::{AnalysisCache, AnalysisError, ClassAnalyzer, ClassCoverageModel};
pub use crate::report::TestCoverageAggregate;
pub use crate::source::{FileCoverage, Line, SourceCoverage};
pub use crate::testwise::{
    ExecutionKind, LogicalTest, MergedTests, TestDetails, TestExecution, TestOutcome,
    TestResult, TestwiseMerger, UnresolvedHook,
};
