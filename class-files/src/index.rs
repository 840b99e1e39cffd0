// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

use crate::error::ResolutionError;
use crate::{ClassEntry, ClassId};

/// Resolved class files, keyed by class id.
#[derive(Clone, Debug, Default)]
pub struct ClassIndex {
    classes: HashMap<ClassId, ClassEntry>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain a resolver, failing on the first duplicate conflict it reports.
    pub fn build(
        entries: impl IntoIterator<Item = Result<ClassEntry, ResolutionError>>,
    ) -> Result<Self, ResolutionError> {
        let mut index = Self::new();

        for entry in entries {
            index.insert(entry?);
        }

        debug!("indexed {} classes", index.len());

        Ok(index)
    }

    pub fn insert(&mut self, entry: ClassEntry) {
        self.classes.insert(entry.id, entry);
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassEntry> {
        self.classes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.classes.values()
    }
}
