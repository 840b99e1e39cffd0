// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;

use anyhow::{Context, Result};
use regex::{Regex, RegexSet};

/// Include/exclude rules over class file locations.
///
/// Patterns are Ant-style: `**` spans any number of path segments, `*` and
/// `?` stay within one segment. Both `/` and the archive separator `@` end a
/// segment.
///
/// A location is included when it matches some include pattern (or no include
/// patterns exist) and matches no exclude pattern.
#[derive(Clone, Debug)]
pub struct LocationFilter {
    include: RegexSet,
    exclude: RegexSet,
}

impl LocationFilter {
    pub fn new(includes: &[impl AsRef<str>], excludes: &[impl AsRef<str>]) -> Result<Self> {
        let include = compile(includes)?;
        let exclude = compile(excludes)?;

        Ok(Self { include, exclude })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read location filter `{}`", path.display()))?;
        Self::parse(&text)
    }

    /// Parse line-oriented rules: `# ` starts a comment, `! ` an exclude
    /// pattern, and any other non-blank line is an include pattern.
    pub fn parse(text: &str) -> Result<Self> {
        let mut include = vec![];
        let mut exclude = vec![];

        // Check each rule individually for diagnostic purposes.
        for (index, line) in text.lines().enumerate() {
            match FilterLine::parse(line) {
                Ok(FilterLine::Blank | FilterLine::Comment) => {}
                Ok(FilterLine::Include(re)) => include.push(re),
                Ok(FilterLine::Exclude(re)) => exclude.push(re),
                Err(err) => {
                    // Ignore invalid lines, but warn.
                    let line_number = index + 1;
                    warn!("error at line {}: {}", line_number, err);
                }
            }
        }

        let include = RegexSet::new(include.iter().map(|re| re.as_str()))?;
        let exclude = RegexSet::new(exclude.iter().map(|re| re.as_str()))?;

        Ok(Self { include, exclude })
    }

    pub fn is_included(&self, location: impl AsRef<str>) -> bool {
        let location = location.as_ref();

        let included = self.include.is_empty() || self.include.is_match(location);
        included && !self.exclude.is_match(location)
    }

    /// Add the include and exclude rules of `other` to `self`.
    pub fn extend(&mut self, other: &Self) -> Result<()> {
        self.include = add_regexsets(&self.include, &other.include)?;
        self.exclude = add_regexsets(&self.exclude, &other.exclude)?;

        Ok(())
    }
}

impl Default for LocationFilter {
    fn default() -> Self {
        Self {
            include: RegexSet::empty(),
            exclude: RegexSet::empty(),
        }
    }
}

fn compile(patterns: &[impl AsRef<str>]) -> Result<RegexSet> {
    let mut exprs = vec![];

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let re = ant_to_regex(pattern)
            .with_context(|| format!("invalid location pattern `{pattern}`"))?;
        exprs.push(re.as_str().to_owned());
    }

    Ok(RegexSet::new(exprs)?)
}

fn add_regexsets(lhs: &RegexSet, rhs: &RegexSet) -> Result<RegexSet> {
    let mut patterns = lhs.patterns().to_vec();
    patterns.extend(rhs.patterns().iter().cloned());

    Ok(RegexSet::new(&patterns)?)
}

pub enum FilterLine {
    Blank,
    Comment,
    Include(Regex),
    Exclude(Regex),
}

impl FilterLine {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();

        if line.is_empty() {
            return Ok(Self::Blank);
        }

        if line.starts_with("# ") {
            return Ok(Self::Comment);
        }

        if let Some(pattern) = line.strip_prefix("! ") {
            return Ok(Self::Exclude(ant_to_regex(pattern)?));
        }

        Ok(Self::Include(ant_to_regex(line)?))
    }
}

fn ant_to_regex(pattern: &str) -> Result<Regex> {
    let pattern = pattern.trim().replace('\\', "/");

    let mut expr = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();

                if chars.peek() == Some(&'/') {
                    chars.next();
                    // Zero or more whole segments.
                    expr.push_str("(?:.*[/@])?");
                } else {
                    expr.push_str(".*");
                }
            }
            '*' => expr.push_str("[^/@]*"),
            '?' => expr.push_str("[^/@]"),
            c => {
                let mut buf = [0; 4];
                expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }

    // Anchor to line start and end.
    // On Windows we should also ignore case.
    let expr = if cfg!(windows) {
        format!("(?i)^{expr}$")
    } else {
        format!("^{expr}$")
    };

    Ok(Regex::new(&expr)?)
}

#[cfg(test)]
mod tests;
