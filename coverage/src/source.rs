// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{btree_set, BTreeMap, BTreeSet};
use std::fmt;
use std::iter::Peekable;
use std::ops::RangeInclusive;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Line number in a source file (1-indexed).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Line(u32);

impl Line {
    pub fn new(number: u32) -> Result<Self> {
        if number == 0 {
            bail!("source lines must be 1-indexed");
        }

        Ok(Self(number))
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Covered lines of one source file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileCoverage {
    pub lines: BTreeSet<Line>,
}

impl FileCoverage {
    /// Maximal runs of consecutive covered lines, in ascending order.
    pub fn ranges(&self) -> LineRanges<'_> {
        LineRanges {
            lines: self.lines.iter().peekable(),
        }
    }
}

/// Formats as comma-separated ranges, e.g. `1-2,5`.
impl fmt::Display for FileCoverage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, range) in self.ranges().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }

            if range.start() == range.end() {
                write!(f, "{}", range.start())?;
            } else {
                write!(f, "{}-{}", range.start(), range.end())?;
            }
        }

        Ok(())
    }
}

pub struct LineRanges<'a> {
    lines: Peekable<btree_set::Iter<'a, Line>>,
}

impl<'a> Iterator for LineRanges<'a> {
    type Item = RangeInclusive<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.lines.next()?.0;
        let mut end = start;

        while let Some(line) = self.lines.next_if(|line| end.checked_add(1) == Some(line.0)) {
            end = line.0;
        }

        Some(start..=end)
    }
}

/// Covered lines, keyed by source path relative to the source root.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceCoverage {
    pub files: BTreeMap<String, FileCoverage>,
}

impl SourceCoverage {
    pub fn add_lines(&mut self, file: &str, lines: impl IntoIterator<Item = Line>) {
        let mut lines = lines.into_iter().peekable();

        // Files with no covered lines are not recorded.
        if lines.peek().is_none() {
            return;
        }

        self.files
            .entry(file.to_owned())
            .or_default()
            .lines
            .extend(lines);
    }

    pub fn merge(&mut self, other: SourceCoverage) {
        for (file, coverage) in other.files {
            self.add_lines(&file, coverage.lines);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
