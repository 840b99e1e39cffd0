// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Whole-suite line coverage report, one session spanning every dump.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <coverage session="merged" start="1000" dump="1250">
//!   <file path="com/foo/Bar.java">
//!     <lines>1-3,5</lines>
//!   </file>
//! </coverage>
//! ```

use std::io::Write;

use anyhow::Result;
use coverage::binary::SessionInfo;
use coverage::source::SourceCoverage;
use quick_xml::events::{BytesDecl, Event};
use quick_xml::Writer;

use crate::testwise::{SourceFile, WriteXml};

pub struct LineCoverageReport<'a> {
    pub session: &'a SessionInfo,
    pub coverage: &'a SourceCoverage,
}

impl<'a> LineCoverageReport<'a> {
    pub fn new(session: &'a SessionInfo, coverage: &'a SourceCoverage) -> Self {
        Self { session, coverage }
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

impl<'a> WriteXml for LineCoverageReport<'a> {
    fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let start = self.session.start.to_string();
        let dump = self.session.dump.to_string();

        let element = writer.create_element("coverage").with_attributes([
            ("session", self.session.id.as_str()),
            ("start", start.as_str()),
            ("dump", dump.as_str()),
        ]);

        if self.coverage.is_empty() {
            element.write_empty()?;
            return Ok(());
        }

        element.write_inner_content(|w| {
            for (path, file) in &self.coverage.files {
                SourceFile { path, file }.write_xml(w)?;
            }

            Ok(())
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use coverage::source::Line;
    use pretty_assertions::assert_eq;

    use super::*;

    fn compact(xml: &str) -> String {
        xml.lines().map(str::trim).collect()
    }

    #[test]
    fn test_to_xml() -> Result<()> {
        let mut coverage = SourceCoverage::default();
        coverage.add_lines(
            "com/foo/Bar.java",
            [1, 2, 3, 5].into_iter().map(Line::new).collect::<Result<Vec<_>>>()?,
        );

        let session = SessionInfo::new("merged", 1_000, 1_250);
        let text = LineCoverageReport::new(&session, &coverage).to_xml()?;

        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<coverage session="merged" start="1000" dump="1250">
  <file path="com/foo/Bar.java">
    <lines>1-3,5</lines>
  </file>
</coverage>
"#;

        assert_eq!(compact(&text), compact(expected));

        Ok(())
    }

    #[test]
    fn test_no_coverage() -> Result<()> {
        let session = SessionInfo::new("merged", 0, 0);
        let text = LineCoverageReport::new(&session, &SourceCoverage::default()).to_xml()?;

        assert!(text.ends_with("<coverage session=\"merged\" start=\"0\" dump=\"0\"/>\n"));

        Ok(())
    }
}
