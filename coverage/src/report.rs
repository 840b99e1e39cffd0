// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::source::SourceCoverage;
use crate::testwise::TestResult;

/// Line coverage of one logical test, ready to be written.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestCoverageAggregate {
    pub id: String,
    pub duration: Duration,
    pub result: TestResult,
    pub coverage: SourceCoverage,
}
