// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use anyhow::Result;
use class_files::{ClassEntry, ClassIdentity};
use fixedbitset::FixedBitSet;
use thiserror::Error;

use crate::source::Line;

/// Derives the probe-to-line model of a class from its bytes.
pub trait ClassAnalyzer: Send + Sync {
    fn analyze(&self, class: &ClassEntry) -> Result<ClassCoverageModel>;
}

impl<F> ClassAnalyzer for F
where
    F: Fn(&ClassEntry) -> Result<ClassCoverageModel> + Send + Sync,
{
    fn analyze(&self, class: &ClassEntry) -> Result<ClassCoverageModel> {
        self(class)
    }
}

/// For each probe of a class, the source lines it proves executed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClassCoverageModel {
    /// Source path relative to the source root, e.g. `com/foo/Bar.java`.
    pub source_path: String,

    /// Lines per probe index.
    pub probes: Vec<BTreeSet<Line>>,
}

impl ClassCoverageModel {
    pub fn new(source_path: impl Into<String>, probes: Vec<BTreeSet<Line>>) -> Self {
        Self {
            source_path: source_path.into(),
            probes,
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Union of the lines of every probe set in `hits`.
    pub fn covered_lines<'a>(&'a self, hits: &'a FixedBitSet) -> impl Iterator<Item = Line> + 'a {
        hits.ones()
            .filter_map(|probe| self.probes.get(probe))
            .flatten()
            .copied()
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unable to analyze class {class}: {reason}")]
pub struct AnalysisError {
    pub class: ClassIdentity,
    pub reason: String,
}

type Slot = Arc<OnceLock<Result<Arc<ClassCoverageModel>, AnalysisError>>>;

/// Memoizes class analysis by class identity.
///
/// Each identity is analyzed at most once, including across threads. A failed
/// analysis is remembered and not retried.
pub struct AnalysisCache {
    analyzer: Box<dyn ClassAnalyzer>,
    slots: Mutex<HashMap<ClassIdentity, Slot>>,
    analyzed: AtomicUsize,
}

impl AnalysisCache {
    pub fn new(analyzer: impl ClassAnalyzer + 'static) -> Self {
        Self {
            analyzer: Box::new(analyzer),
            slots: Mutex::default(),
            analyzed: AtomicUsize::new(0),
        }
    }

    pub fn model_for(&self, class: &ClassEntry) -> Result<Arc<ClassCoverageModel>, AnalysisError> {
        let identity = class.identity();

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(identity.clone()).or_default().clone()
        };

        // Only the slot is held while analyzing, so unrelated classes proceed.
        slot.get_or_init(|| self.analyze(identity, class)).clone()
    }

    fn analyze(
        &self,
        identity: ClassIdentity,
        class: &ClassEntry,
    ) -> Result<Arc<ClassCoverageModel>, AnalysisError> {
        self.analyzed.fetch_add(1, Ordering::Relaxed);

        match self.analyzer.analyze(class) {
            Ok(model) => Ok(Arc::new(model)),
            Err(err) => {
                let err = AnalysisError {
                    class: identity,
                    reason: format!("{err:#}"),
                };
                warn!("{}; its coverage is omitted", err);
                Err(err)
            }
        }
    }

    /// Number of times the analyzer has run.
    pub fn analyzed(&self) -> usize {
        self.analyzed.load(Ordering::Relaxed)
    }

    /// Number of class identities with a cached result.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
