// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::time::Duration;

use class_files::ClassId;
use fixedbitset::FixedBitSet;
use thiserror::Error;

/// Probe hits recorded for one class version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionData {
    pub id: ClassId,

    /// VM name of the class.
    pub name: String,

    pub probes: FixedBitSet,
}

impl ExecutionData {
    pub fn new(id: ClassId, name: impl Into<String>, probes: FixedBitSet) -> Self {
        Self {
            id,
            name: name.into(),
            probes,
        }
    }

    pub fn from_bools(id: ClassId, name: impl Into<String>, probes: &[bool]) -> Self {
        let mut bits = FixedBitSet::with_capacity(probes.len());

        for (index, hit) in probes.iter().enumerate() {
            bits.set(index, *hit);
        }

        Self::new(id, name, bits)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn has_hits(&self) -> bool {
        self.probes.ones().next().is_some()
    }

    /// Fold `other` into `self` by OR-ing probes.
    pub fn merge(&mut self, other: &ExecutionData) -> Result<(), IncompatibleExecutionData> {
        if self.name != other.name {
            return Err(IncompatibleExecutionData::Name {
                id: self.id,
                existing: self.name.clone(),
                incoming: other.name.clone(),
            });
        }

        if self.probe_count() != other.probe_count() {
            return Err(IncompatibleExecutionData::ProbeCount {
                id: self.id,
                name: self.name.clone(),
                existing: self.probe_count(),
                incoming: other.probe_count(),
            });
        }

        self.probes.union_with(&other.probes);

        Ok(())
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IncompatibleExecutionData {
    #[error("different class names `{existing}` and `{incoming}` for class id {id}")]
    Name {
        id: ClassId,
        existing: String,
        incoming: String,
    },

    #[error("incompatible execution data for class `{name}` with id {id}: {existing} vs {incoming} probes")]
    ProbeCount {
        id: ClassId,
        name: String,
        existing: usize,
        incoming: usize,
    },
}

/// Execution data keyed by class id. At most one entry per id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionDataStore {
    pub entries: BTreeMap<ClassId, ExecutionData>,
}

impl ExecutionDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `data`, merging with any entry already recorded for its class id.
    ///
    /// On error the store is left unchanged.
    pub fn put(&mut self, data: ExecutionData) -> Result<(), IncompatibleExecutionData> {
        match self.entries.get_mut(&data.id) {
            Some(existing) => existing.merge(&data),
            None => {
                self.entries.insert(data.id, data);
                Ok(())
            }
        }
    }

    /// Merge every entry of `other` into `self`.
    ///
    /// Compatible entries are merged even when others are rejected. Rejections
    /// are returned.
    pub fn merge(&mut self, other: ExecutionDataStore) -> Vec<IncompatibleExecutionData> {
        let mut rejected = vec![];

        for data in other.entries.into_values() {
            if let Err(err) = self.put(data) {
                rejected.push(err);
            }
        }

        rejected
    }

    pub fn get(&self, id: ClassId) -> Option<&ExecutionData> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity and time span of one recording session.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionInfo {
    pub id: String,
    pub start: i64,
    pub dump: i64,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>, start: i64, dump: i64) -> Self {
        Self {
            id: id.into(),
            start,
            dump,
        }
    }

    pub fn duration(&self) -> Duration {
        let millis = self.dump.saturating_sub(self.start).max(0);
        Duration::from_millis(millis as u64)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionInfoStore {
    infos: Vec<SessionInfo>,
}

impl SessionInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, info: SessionInfo) {
        self.infos.push(info);
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn infos(&self) -> &[SessionInfo] {
        &self.infos
    }

    /// A session named `id` spanning the earliest start to the latest dump.
    pub fn merged(&self, id: impl Into<String>) -> SessionInfo {
        let start = self.infos.iter().map(|info| info.start).min().unwrap_or(0);
        let dump = self.infos.iter().map(|info| info.dump).max().unwrap_or(0);

        SessionInfo::new(id, start, dump)
    }
}

/// One session's worth of execution data, as delimited in a dump payload.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionDataDump {
    pub session: SessionInfo,
    pub store: ExecutionDataStore,
}

impl ExecutionDataDump {
    pub fn new(session: SessionInfo) -> Self {
        Self {
            session,
            store: ExecutionDataStore::default(),
        }
    }

    /// Combine several dumps into one session named `id`.
    ///
    /// Incompatible entries are dropped with a warning.
    pub fn combine(id: impl Into<String>, dumps: impl IntoIterator<Item = Self>) -> Self {
        let mut sessions = SessionInfoStore::new();
        let mut store = ExecutionDataStore::new();

        for dump in dumps {
            sessions.add(dump.session);

            for err in store.merge(dump.store) {
                warn!("dropping execution data: {}", err);
            }
        }

        Self {
            session: sessions.merged(id),
            store,
        }
    }
}
