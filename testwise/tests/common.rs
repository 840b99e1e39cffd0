// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use class_files::synth::class_file;
use class_files::{ClassEntry, ClassId};
use coverage::binary::{ExecutionData, ExecutionDataDump, SessionInfo};
use coverage::cache::{ClassAnalyzer, ClassCoverageModel};
use coverage::source::Line;
use tempfile::TempDir;
use testwise::Config;

pub const BAR: &str = "com/foo/Bar";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Class roots on disk holding `com/foo/Bar`.
pub struct Classes {
    pub dir: TempDir,
    pub bar: Vec<u8>,
}

impl Classes {
    pub fn new() -> Result<Self> {
        init_logging();

        let dir = tempfile::tempdir()?;
        let bar = class_file(BAR, Some("Bar.java"), "v1");
        write(dir.path(), "classes/com/foo/Bar.class", &bar)?;

        Ok(Self { dir, bar })
    }

    pub fn root(&self) -> std::path::PathBuf {
        self.dir.path().join("classes")
    }

    pub fn config(&self) -> Config {
        Config {
            class_roots: vec![self.root()],
            ..Config::default()
        }
    }

    pub fn bar_id(&self) -> ClassId {
        ClassId::of(&self.bar)
    }

    /// A dump for test `id` with the given probes of `com/foo/Bar`.
    pub fn dump(&self, id: &str, probes: &[bool]) -> Result<ExecutionDataDump> {
        let mut dump = ExecutionDataDump::new(SessionInfo::new(id, 1_000, 1_250));
        dump.store
            .put(ExecutionData::from_bools(self.bar_id(), BAR, probes))?;

        Ok(dump)
    }
}

pub fn write(root: &Path, relative: &str, data: &[u8]) -> Result<()> {
    let path = root.join(relative);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, data)?;
    Ok(())
}

fn lines(numbers: &[u32]) -> Result<BTreeSet<Line>> {
    numbers.iter().map(|n| Line::new(*n)).collect()
}

/// Analyzer that knows `com/foo/Bar`, whose three probes cover lines
/// `{1, 2}`, `{3}` and `{5}`.
pub fn analyzer() -> (impl ClassAnalyzer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let analyzer = move |class: &ClassEntry| -> Result<ClassCoverageModel> {
        counter.fetch_add(1, Ordering::SeqCst);

        if class.name != BAR {
            bail!("no debug information");
        }

        let probes = vec![lines(&[1, 2])?, lines(&[3])?, lines(&[5])?];
        Ok(ClassCoverageModel::new(class.source_path(), probes))
    };

    (analyzer, calls)
}

/// Strip indentation, which is not part of the format.
pub fn compact(xml: &str) -> String {
    xml.lines().map(str::trim).collect()
}
