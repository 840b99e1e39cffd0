// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! JUnit XML test report.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <testsuite tests="2" failures="1" errors="0" skipped="0" time="0.375">
//!   <testcase classname="com/foo/BarTest" name="test1" time="0.250"/>
//!   <testcase classname="com/foo/BarTest" name="test2" time="0.125">
//!     <failure>boom</failure>
//!   </testcase>
//! </testsuite>
//! ```

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use coverage::testwise::{TestOutcome, TestResult};
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;

use crate::testwise::WriteXml;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JUnitTestCase {
    pub class_name: String,
    pub name: String,
    pub duration: Duration,
    pub result: TestResult,
}

impl JUnitTestCase {
    /// Split `internal_id` at its last `/` into class name and test name.
    pub fn new(internal_id: &str, duration: Duration, result: TestResult) -> Self {
        let (class_name, name) = internal_id.rsplit_once('/').unwrap_or(("", internal_id));

        Self {
            class_name: class_name.to_owned(),
            name: name.to_owned(),
            duration,
            result,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JUnitReport {
    pub test_cases: Vec<JUnitTestCase>,
}

impl JUnitReport {
    pub fn new(test_cases: Vec<JUnitTestCase>) -> Self {
        Self { test_cases }
    }

    fn count(&self, matches: impl Fn(TestOutcome) -> bool) -> usize {
        self.test_cases
            .iter()
            .filter(|case| matches(case.result.outcome))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.count(|outcome| outcome == TestOutcome::Failure)
    }

    pub fn errors(&self) -> usize {
        self.count(|outcome| outcome == TestOutcome::Error)
    }

    /// Ignored tests are reported as skipped.
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, TestOutcome::Ignored | TestOutcome::Skipped))
    }

    pub fn duration(&self) -> Duration {
        self.test_cases.iter().map(|case| case.duration).sum()
    }

    pub fn write<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(output, b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_xml(&mut writer)?;

        let output = writer.inner();
        output.write_all(b"\n")?;
        output.flush()?;

        Ok(())
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut data = Vec::new();
        self.write(&mut data)?;

        Ok(String::from_utf8(data)?)
    }
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

impl WriteXml for JUnitReport {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let tests = self.test_cases.len().to_string();
        let failures = self.failures().to_string();
        let errors = self.errors().to_string();
        let skipped = self.skipped().to_string();
        let time = seconds(self.duration());

        let element = writer.create_element("testsuite").with_attributes([
            ("tests", tests.as_str()),
            ("failures", failures.as_str()),
            ("errors", errors.as_str()),
            ("skipped", skipped.as_str()),
            ("time", time.as_str()),
        ]);

        if self.test_cases.is_empty() {
            element.write_empty()?;
            return Ok(());
        }

        element.write_inner_content(|w| {
            for case in &self.test_cases {
                case.write_xml(w)?;
            }

            Ok(())
        })?;

        Ok(())
    }
}

impl WriteXml for JUnitTestCase {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let time = seconds(self.duration);

        let element = writer.create_element("testcase").with_attributes([
            ("classname", self.class_name.as_str()),
            ("name", self.name.as_str()),
            ("time", time.as_str()),
        ]);

        let child = match self.result.outcome {
            TestOutcome::Passed => None,
            TestOutcome::Ignored | TestOutcome::Skipped => Some("skipped"),
            TestOutcome::Failure => Some("failure"),
            TestOutcome::Error => Some("error"),
        };

        let Some(child) = child else {
            element.write_empty()?;
            return Ok(());
        };

        element.write_inner_content(|w| {
            let child = w.create_element(child);

            match &self.result.message {
                Some(message) => child.write_text_content(BytesText::new(message))?,
                None => child.write_empty()?,
            };

            Ok(())
        })?;

        Ok(())
    }
}
