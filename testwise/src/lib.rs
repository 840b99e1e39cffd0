// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde;

pub mod collector;
pub mod config;
pub mod generator;

pub use crate::collector::{
    dispatch, JUnitReportCollector, JaCoCoCoverageCollector, TestDetailsCollector, TestEvent,
    TestEventSource, TestListener, TestwiseCoverageCollector,
};
pub use crate::config::Config;
pub use crate::generator::{ReportSummary, TestwiseReportGenerator};
