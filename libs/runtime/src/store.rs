//! # Probe Store
//!
//! Process-wide registry of live probe arrays. Registration takes a short
//! write lock on an append-only table; probe writes go through the returned
//! [`ProbeArray`] handle and never touch the lock.
//!
//! ```text
//! instrumentation ──register──→ [ProbeStore] ──snapshot──→ ExecutionDataSet
//!        │                            ↑                        ↓
//!        └──── ProbeArray::hit ───────┘                   controllers
//! ```

use crate::probes::ProbeArray;
use crate::session::Session;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{debug, trace, warn};
use types::{ClassId, DataError, DataResult, ExecutionData, ExecutionDataSet};

struct Entry {
    id: ClassId,
    name: String,
    probes: ProbeArray,
}

#[derive(Default)]
struct Registry {
    entries: Vec<Entry>,
    index: HashMap<ClassId, usize>,
}

impl Registry {
    fn lookup(&self, id: ClassId) -> Option<&Entry> {
        self.index.get(&id).map(|&slot| &self.entries[slot])
    }
}

/// Shared store of every registered class and the current session
pub struct ProbeStore {
    registry: RwLock<Registry>,
    session: Mutex<Session>,
}

impl ProbeStore {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            session: Mutex::new(Session::new(session_id)),
        }
    }

    /// Get the probe array for a class, creating it on first use
    ///
    /// Repeated calls with the same id, name and probe count return handles
    /// to the same array. A different probe count or class name for a known
    /// id fails with `ClassIdCollision` and leaves the entry untouched.
    pub fn register(
        &self,
        id: ClassId,
        name: impl Into<String>,
        probe_count: usize,
    ) -> DataResult<ProbeArray> {
        let name = name.into();
        if let Some(entry) = self.registry.read().lookup(id) {
            return Self::existing(entry, &name, probe_count);
        }

        let mut registry = self.registry.write();
        // Another thread may have registered between the two locks
        if let Some(entry) = registry.lookup(id) {
            return Self::existing(entry, &name, probe_count);
        }

        let probes = ProbeArray::new(probe_count);
        debug!(class_id = %id, class_name = %name, probe_count, "registered class");
        let slot = registry.entries.len();
        registry.entries.push(Entry {
            id,
            name,
            probes: probes.clone(),
        });
        registry.index.insert(id, slot);
        Ok(probes)
    }

    fn existing(entry: &Entry, name: &str, probe_count: usize) -> DataResult<ProbeArray> {
        if entry.probes.len() != probe_count {
            warn!(
                class_id = %entry.id,
                class_name = %entry.name,
                registered = entry.probes.len(),
                requested = probe_count,
                "class id collision"
            );
            return Err(DataError::collision(
                entry.id,
                entry.name.clone(),
                entry.probes.len(),
                probe_count,
            ));
        }
        if entry.name != name {
            warn!(
                class_id = %entry.id,
                registered = %entry.name,
                requested = %name,
                "class id collision"
            );
            return Err(DataError::name_collision(entry.id, entry.name.clone(), name));
        }
        Ok(entry.probes.clone())
    }

    /// Handle of an already registered class
    pub fn get(&self, id: ClassId) -> Option<ProbeArray> {
        self.registry.read().lookup(id).map(|e| e.probes.clone())
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.registry.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy all probe arrays, in registration order, with the current session
    ///
    /// With `reset` every array is cleared right after it is copied and the
    /// session start time restarts. Probes set between copy and clear are
    /// lost.
    pub fn snapshot(&self, reset: bool) -> ExecutionDataSet {
        let mut set = ExecutionDataSet::new();
        {
            let mut session = self.session.lock();
            set.add_session(session.info());
            if reset {
                session.restart();
            }
        }

        let registry = self.registry.read();
        for entry in &registry.entries {
            let data = ExecutionData::new(entry.id, entry.name.clone(), entry.probes.snapshot());
            if reset {
                entry.probes.reset();
            }
            if let Err(error) = set.merge_in(data) {
                // Registry ids are unique; reaching this is a registry bug
                warn!(%error, "inconsistent probe registry");
            }
        }
        trace!(classes = set.len(), reset, "snapshot taken");
        set
    }

    /// Clear all probes and restart the session
    pub fn reset(&self) {
        for entry in &self.registry.read().entries {
            entry.probes.reset();
        }
        self.session.lock().restart();
        debug!("probe store reset");
    }

    pub fn session_id(&self) -> String {
        self.session.lock().id().to_string()
    }

    pub fn set_session_id(&self, id: impl Into<String>) {
        self.session.lock().set_id(id);
    }

    /// Start time of the current session in epoch milliseconds
    pub fn start_time(&self) -> i64 {
        self.session.lock().start_time()
    }
}

impl Default for ProbeStore {
    fn default() -> Self {
        Self::new("")
    }
}

impl std::fmt::Debug for ProbeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeStore")
            .field("classes", &self.len())
            .field("session", &self.session_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let store = ProbeStore::new("s");
        let a = store.register(ClassId::new(1), "A", 3).unwrap();
        let b = store.register(ClassId::new(1), "A", 3).unwrap();
        assert!(a.same_array(&b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_register_rejects_different_class_name() {
        let store = ProbeStore::new("s");
        let a = store.register(ClassId::new(1), "A", 3).unwrap();
        a.hit(2);
        let err = store.register(ClassId::new(1), "renamed", 3).unwrap_err();
        assert_eq!(err, DataError::name_collision(ClassId::new(1), "A", "renamed"));
        assert_eq!(store.len(), 1);

        let snapshot = store.snapshot(false);
        let entry = snapshot.get(ClassId::new(1)).unwrap();
        assert_eq!(entry.name(), "A");
        assert_eq!(entry.probes(), &[false, false, true]);
    }

    #[test]
    fn test_collision_keeps_existing_entry() {
        let store = ProbeStore::new("s");
        let a = store.register(ClassId::new(1), "A", 3).unwrap();
        a.hit(0);
        let err = store.register(ClassId::new(1), "B", 4).unwrap_err();
        assert_eq!(err, DataError::collision(ClassId::new(1), "A", 3, 4));
        assert_eq!(store.get(ClassId::new(1)).unwrap().snapshot(), vec![true, false, false]);
    }

    #[test]
    fn test_snapshot_order_and_session() {
        let store = ProbeStore::new("host-1");
        for id in [5u64, 2, 9] {
            store.register(ClassId::new(id), format!("C{id}"), 1).unwrap();
        }
        let snapshot = store.snapshot(false);
        let ids: Vec<u64> = snapshot.iter().map(|d| d.id().as_u64()).collect();
        assert_eq!(ids, vec![5, 2, 9]);
        assert_eq!(snapshot.sessions().len(), 1);
        assert_eq!(snapshot.sessions()[0].id(), "host-1");
    }

    #[test]
    fn test_snapshot_with_reset() {
        let store = ProbeStore::new("s");
        let probes = store.register(ClassId::new(1), "A", 2).unwrap();
        probes.hit(1);

        let first = store.snapshot(true);
        assert_eq!(first.get(ClassId::new(1)).unwrap().probes(), &[false, true]);
        let second = store.snapshot(false);
        assert_eq!(second.get(ClassId::new(1)).unwrap().probes(), &[false, false]);
        assert!(second.sessions()[0].start_time() >= first.sessions()[0].start_time());

        // The handle stays live after a reset
        probes.hit(0);
        assert_eq!(store.snapshot(false).get(ClassId::new(1)).unwrap().probes(), &[true, false]);
    }

    #[test]
    fn test_reset_and_session_id() {
        let store = ProbeStore::default();
        let probes = store.register(ClassId::new(1), "A", 1).unwrap();
        probes.hit(0);
        store.reset();
        assert_eq!(probes.get(0), Some(false));

        store.set_session_id("other");
        assert_eq!(store.session_id(), "other");
        assert!(store.get(ClassId::new(2)).is_none());
    }
}
