use crate::{GroupEntry, GroupId, Mode, PartialGroupData};
use std::collections::{BTreeMap, BTreeSet};

/// Which ids a full snapshot created, refreshed, and evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: BTreeSet<GroupId>,
    pub updated: BTreeSet<GroupId>,
    pub removed: BTreeSet<GroupId>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Every id the snapshot mentioned, new or existing.
    pub fn touched(&self) -> impl Iterator<Item = &GroupId> {
        self.added.iter().chain(self.updated.iter())
    }

    pub fn membership_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeDiff {
    pub updated: BTreeSet<GroupId>,
    /// Ids the server named that this client is not tracking.
    pub ignored: BTreeSet<GroupId>,
}

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    entries: BTreeMap<GroupId, GroupEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a full snapshot. Ids present are created or merged field by
    /// field; tracked ids missing from the snapshot are evicted. Blank ids
    /// are skipped.
    pub fn apply_snapshot(&mut self, snapshot: BTreeMap<GroupId, PartialGroupData>) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();
        let mut present = BTreeSet::new();

        for (id, data) in snapshot {
            if id.trim().is_empty() {
                continue;
            }
            present.insert(id.clone());
            match self.entries.get_mut(&id) {
                Some(entry) => {
                    entry.merge(data);
                    diff.updated.insert(id);
                }
                None => {
                    let mut entry = GroupEntry::new(id.clone());
                    entry.merge(data);
                    self.entries.insert(id.clone(), entry);
                    diff.added.insert(id);
                }
            }
        }

        self.entries.retain(|id, _| {
            if present.contains(id) {
                return true;
            }
            diff.removed.insert(id.clone());
            false
        });

        diff
    }

    /// Sets `mode` on tracked ids only; unknown ids never create entries.
    pub fn apply_mode_update(&mut self, modes: BTreeMap<GroupId, Mode>) -> ModeDiff {
        let mut diff = ModeDiff::default();
        for (id, mode) in modes {
            match self.entries.get_mut(&id) {
                Some(entry) => {
                    entry.mode = mode;
                    diff.updated.insert(id);
                }
                None => {
                    diff.ignored.insert(id);
                }
            }
        }
        diff
    }

    pub fn get(&self, id: &str) -> Option<&GroupEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &GroupId> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &GroupEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
