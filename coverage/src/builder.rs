// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use class_files::{ClassEntry, ClassId, ClassIndex};

use crate::binary::{ExecutionData, ExecutionDataStore};
use crate::cache::AnalysisCache;
use crate::report::TestCoverageAggregate;
use crate::source::SourceCoverage;
use crate::testwise::LogicalTest;

/// Translates probe hits into source line coverage.
pub struct CoverageBuilder {
    classes: ClassIndex,
    cache: AnalysisCache,
    warned: Mutex<HashSet<ClassId>>,
}

impl CoverageBuilder {
    pub fn new(classes: ClassIndex, cache: AnalysisCache) -> Self {
        Self {
            classes,
            cache,
            warned: Mutex::default(),
        }
    }

    pub fn classes(&self) -> &ClassIndex {
        &self.classes
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn build(&self, test: LogicalTest) -> TestCoverageAggregate {
        let coverage = self.source_coverage(&test.store);

        TestCoverageAggregate {
            id: test.id,
            duration: test.duration,
            result: test.result,
            coverage,
        }
    }

    pub fn source_coverage(&self, store: &ExecutionDataStore) -> SourceCoverage {
        let mut coverage = SourceCoverage::default();

        for data in store.entries.values() {
            if !data.has_hits() {
                continue;
            }

            let Some(class) = self.lookup(data) else {
                continue;
            };

            // Failures are logged once by the cache.
            let Ok(model) = self.cache.model_for(class) else {
                continue;
            };

            if model.probe_count() != data.probe_count() {
                if self.first_warning(data.id) {
                    warn!(
                        "execution data for class {} ({}) has {} probes, but its class file has {}; its coverage is omitted",
                        data.name,
                        data.id,
                        data.probe_count(),
                        model.probe_count()
                    );
                }
                continue;
            }

            coverage.add_lines(&model.source_path, model.covered_lines(&data.probes));
        }

        coverage
    }

    fn lookup(&self, data: &ExecutionData) -> Option<&ClassEntry> {
        match self.classes.get(data.id) {
            Some(class) if class.name == data.name => Some(class),
            Some(class) => {
                if self.first_warning(data.id) {
                    warn!(
                        "class id {} names {} in the execution data but {} at `{}`; its coverage is omitted",
                        data.id, data.name, class.name, class.location
                    );
                }
                None
            }
            None => {
                if self.first_warning(data.id) {
                    warn!(
                        "class {} ({}) was not found in the class roots; its coverage is omitted",
                        data.name, data.id
                    );
                }
                None
            }
        }
    }

    fn first_warning(&self, id: ClassId) -> bool {
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }
}

#[cfg(test)]
mod tests;
