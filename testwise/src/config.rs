// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use class_files::{ClassResolver, DuplicatePolicy, LocationFilter};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Directories, archives, or class files to search for classes under test.
    pub class_roots: Vec<PathBuf>,

    /// Ant-style patterns over class file locations.
    #[serde(default)]
    pub location_includes: Vec<String>,

    #[serde(default)]
    pub location_excludes: Vec<String>,

    /// File of additional patterns, one per line. `! ` marks an exclude.
    pub location_filter: Option<PathBuf>,

    /// Keep the first of two differing classes with the same name instead of failing.
    #[serde(default)]
    pub ignore_duplicate_classes: bool,

    /// Module recorded in the test list, overriding what the framework reports.
    pub module: Option<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config `{}`", path.display()))?;

        Self::parse(&text).with_context(|| format!("invalid config `{}`", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.class_roots.is_empty() {
            bail!("at least one class root is required");
        }

        Ok(())
    }

    pub fn location_filter(&self) -> Result<LocationFilter> {
        let mut filter = LocationFilter::new(&self.location_includes, &self.location_excludes)?;

        if let Some(path) = &self.location_filter {
            filter.extend(&LocationFilter::load(path)?)?;
        }

        Ok(filter)
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.ignore_duplicate_classes {
            DuplicatePolicy::KeepFirst
        } else {
            DuplicatePolicy::Fail
        }
    }

    pub fn resolver(&self) -> Result<ClassResolver> {
        let resolver = ClassResolver::new(&self.class_roots)
            .filter(self.location_filter()?)
            .duplicates(self.duplicate_policy());

        Ok(resolver)
    }
}
