//! # Execution Data Sets
//!
//! An [`ExecutionDataSet`] is the unit exchanged over any transport or file:
//! zero or more [`SessionInfo`]s plus one [`ExecutionData`] per class id.
//!
//! Classes are kept in first-insertion order so that serialising a set is
//! deterministic and merge output follows first-seen order across inputs.

use crate::{ClassId, DataResult, ExecutionData, SessionInfo};
use std::collections::HashMap;

/// Sessions plus per-class execution data, keyed by class id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionDataSet {
    sessions: Vec<SessionInfo>,
    entries: Vec<ExecutionData>,
    index: HashMap<ClassId, usize>,
}

impl ExecutionDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a session; sessions are never merged or dropped
    pub fn add_session(&mut self, info: SessionInfo) {
        self.sessions.push(info);
    }

    pub fn sessions(&self) -> &[SessionInfo] {
        &self.sessions
    }

    /// Add one class entry
    ///
    /// A new class id is appended; an existing one is combined by logical OR.
    /// Fails with `StructuralMismatch` if the probe counts differ, leaving the
    /// stored entry untouched.
    pub fn merge_in(&mut self, data: ExecutionData) -> DataResult<()> {
        match self.index.get(&data.id()) {
            Some(&slot) => self.entries[slot].merge(&data),
            None => {
                self.index.insert(data.id(), self.entries.len());
                self.entries.push(data);
                Ok(())
            }
        }
    }

    /// Combine a whole set into this one
    ///
    /// All entries are checked before anything is modified, so a failing
    /// call leaves `self` unchanged.
    pub fn merge_set(&mut self, other: &ExecutionDataSet) -> DataResult<()> {
        for theirs in &other.entries {
            if let Some(mine) = self.get(theirs.id()) {
                mine.assert_compatible(theirs)?;
            }
        }
        self.sessions.extend(other.sessions.iter().cloned());
        for theirs in &other.entries {
            self.merge_in(theirs.clone())?;
        }
        Ok(())
    }

    /// Clear every probe that is covered in `other`
    ///
    /// Classes unknown to this set are ignored. Sessions are kept as they are.
    pub fn subtract(&mut self, other: &ExecutionDataSet) -> DataResult<()> {
        for theirs in &other.entries {
            if let Some(mine) = self.get(theirs.id()) {
                mine.assert_compatible(theirs)?;
            }
        }
        for theirs in &other.entries {
            if let Some(&slot) = self.index.get(&theirs.id()) {
                self.entries[slot].subtract(theirs)?;
            }
        }
        Ok(())
    }

    pub fn get(&self, id: ClassId) -> Option<&ExecutionData> {
        self.index.get(&id).map(|&slot| &self.entries[slot])
    }

    pub fn contains(&self, id: ClassId) -> bool {
        self.index.contains_key(&id)
    }

    /// True if any entry carries the given class name
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name() == name)
    }

    /// Entries in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionData> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[ExecutionData] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear every probe of every class; sessions are kept
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.reset();
        }
    }

    pub fn into_parts(self) -> (Vec<SessionInfo>, Vec<ExecutionData>) {
        (self.sessions, self.entries)
    }
}

impl<'a> IntoIterator for &'a ExecutionDataSet {
    type Item = &'a ExecutionData;
    type IntoIter = std::slice::Iter<'a, ExecutionData>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataError;

    fn entry(id: u64, probes: &[bool]) -> ExecutionData {
        ExecutionData::new(ClassId::new(id), format!("C{id}"), probes.to_vec())
    }

    #[test]
    fn test_keeps_insertion_order() {
        let mut set = ExecutionDataSet::new();
        for id in [9, 3, 7] {
            set.merge_in(entry(id, &[false])).unwrap();
        }
        let ids: Vec<u64> = set.iter().map(|e| e.id().as_u64()).collect();
        assert_eq!(ids, vec![9, 3, 7]);
    }

    #[test]
    fn test_merge_in_combines_existing() {
        let mut set = ExecutionDataSet::new();
        set.merge_in(entry(1, &[true, false])).unwrap();
        set.merge_in(entry(1, &[false, true])).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(ClassId::new(1)).unwrap().probes(), &[true, true]);
    }

    #[test]
    fn test_merge_set_is_all_or_nothing() {
        let mut target = ExecutionDataSet::new();
        target.merge_in(entry(1, &[false, false])).unwrap();
        target.merge_in(entry(2, &[false])).unwrap();

        let mut other = ExecutionDataSet::new();
        other.add_session(SessionInfo::new("s", 1, 2));
        other.merge_in(entry(1, &[true, true])).unwrap();
        other.merge_in(entry(2, &[true, true, true])).unwrap();

        let before = target.clone();
        let err = target.merge_set(&other).unwrap_err();
        assert!(matches!(err, DataError::StructuralMismatch { .. }));
        assert_eq!(target, before);
    }

    #[test]
    fn test_subtract() {
        let mut base = ExecutionDataSet::new();
        base.merge_in(entry(1, &[true, true])).unwrap();
        base.merge_in(entry(2, &[true])).unwrap();

        let mut covered = ExecutionDataSet::new();
        covered.merge_in(entry(1, &[false, true])).unwrap();
        covered.merge_in(entry(3, &[true])).unwrap();

        base.subtract(&covered).unwrap();
        assert_eq!(base.get(ClassId::new(1)).unwrap().probes(), &[true, false]);
        assert_eq!(base.get(ClassId::new(2)).unwrap().probes(), &[true]);
        assert!(!base.contains(ClassId::new(3)));
    }

    #[test]
    fn test_lookup_and_reset() {
        let mut set = ExecutionDataSet::new();
        set.merge_in(entry(5, &[true])).unwrap();
        assert!(set.contains_name("C5"));
        assert!(!set.contains_name("C6"));
        set.reset();
        assert!(!set.get(ClassId::new(5)).unwrap().has_hits());
    }
}
