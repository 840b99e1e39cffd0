// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Streaming testwise coverage report.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <report>
//!   <test id="com/foo/BarTest/test1" duration="0.125" result="PASSED">
//!     <file path="com/foo/Bar.java">
//!       <lines>1-2,5</lines>
//!     </file>
//!   </test>
//! </report>
//! ```

use std::io::{self, Write};

use coverage::report::TestCoverageAggregate;
use coverage::source::FileCoverage;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write testwise report: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("failed to write testwise report: {0}")]
    Io(#[from] io::Error),

    #[error("cannot {action} a report that is {state}")]
    State {
        action: &'static str,
        state: &'static str,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Created,
    Open,
    Closed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Created => "not yet begun",
            Self::Open => "already open",
            Self::Closed => "closed",
        }
    }
}

/// Writes one `<test>` element at a time, so only the test being written is
/// held in memory.
pub struct TestwiseReportWriter<W: Write> {
    writer: Writer<W>,
    state: State,
    tests: usize,
}

impl<W: Write> TestwiseReportWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            writer: Writer::new_with_indent(output, b' ', 2),
            state: State::Created,
            tests: 0,
        }
    }

    /// Write the XML declaration and open the root element.
    pub fn begin(&mut self) -> Result<(), WriteError> {
        self.expect(State::Created, "begin")?;

        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.writer
            .write_event(Event::Start(BytesStart::new("report")))?;

        self.state = State::Open;

        Ok(())
    }

    /// Append `test` to the report and release it.
    pub fn write_test(&mut self, test: TestCoverageAggregate) -> Result<(), WriteError> {
        self.expect(State::Open, "write to")?;

        test.write_xml(&mut self.writer)?;
        self.tests += 1;

        Ok(())
    }

    /// Close the root element and flush the sink.
    pub fn close(&mut self) -> Result<(), WriteError> {
        self.expect(State::Open, "close")?;

        self.writer
            .write_event(Event::End(BytesEnd::new("report")))?;
        self.state = State::Closed;

        let output = self.writer.inner();
        output.write_all(b"\n")?;
        output.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    pub fn tests_written(&self) -> usize {
        self.tests
    }

    fn expect(&self, state: State, action: &'static str) -> Result<(), WriteError> {
        if self.state != state {
            return Err(WriteError::State {
                action,
                state: self.state.name(),
            });
        }

        Ok(())
    }
}

/// Render a complete report in memory.
pub fn to_string(tests: impl IntoIterator<Item = TestCoverageAggregate>) -> anyhow::Result<String> {
    let mut writer = TestwiseReportWriter::new(Vec::new());
    writer.begin()?;

    for test in tests {
        writer.write_test(test)?;
    }

    writer.close()?;
    Ok(String::from_utf8(writer.into_inner())?)
}

pub(crate) trait WriteXml {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()>;
}

impl WriteXml for TestCoverageAggregate {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let duration = format!("{:.3}", self.duration.as_secs_f64());

        let element = writer.create_element("test").with_attributes([
            ("id", self.id.as_str()),
            ("duration", duration.as_str()),
            ("result", self.result.outcome.as_str()),
        ]);

        if self.result.message.is_none() && self.coverage.is_empty() {
            element.write_empty()?;
            return Ok(());
        }

        element.write_inner_content(|w| {
            if let Some(message) = &self.result.message {
                w.create_element("message")
                    .write_text_content(BytesText::new(message))?;
            }

            for (path, file) in &self.coverage.files {
                SourceFile { path, file }.write_xml(w)?;
            }

            Ok(())
        })?;

        Ok(())
    }
}

pub(crate) struct SourceFile<'a> {
    pub(crate) path: &'a str,
    pub(crate) file: &'a FileCoverage,
}

impl<'a> WriteXml for SourceFile<'a> {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let lines = self.file.to_string();

        writer
            .create_element("file")
            .with_attribute(("path", self.path))
            .write_inner_content(|w| {
                w.create_element("lines")
                    .write_text_content(BytesText::new(&lines))?;

                Ok(())
            })?;

        Ok(())
    }
}
