//! Live probe arrays
//!
//! Instrumented code holds a [`ProbeArray`] and flips entries to true as
//! probe sites execute. Writes are relaxed atomic stores: no lock, no torn
//! values, and a probe set before a snapshot is visible to that snapshot or a
//! later one.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to the probes of one registered class
#[derive(Clone)]
pub struct ProbeArray {
    probes: Arc<[AtomicBool]>,
}

impl ProbeArray {
    pub(crate) fn new(probe_count: usize) -> Self {
        Self {
            probes: (0..probe_count).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Mark probe `index` as executed
    ///
    /// Indices come from the instrumentation that requested the array; an
    /// out-of-range index is ignored in release builds.
    #[inline]
    pub fn hit(&self, index: usize) {
        debug_assert!(index < self.probes.len(), "probe index {index} out of range");
        if let Some(probe) = self.probes.get(index) {
            probe.store(true, Ordering::Relaxed);
        }
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.probes.get(index).map(|p| p.load(Ordering::Relaxed))
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Copy the current probe values
    pub fn snapshot(&self) -> Vec<bool> {
        self.probes.iter().map(|p| p.load(Ordering::Relaxed)).collect()
    }

    /// Clear every probe
    pub fn reset(&self) {
        for probe in self.probes.iter() {
            probe.store(false, Ordering::Relaxed);
        }
    }

    /// True if both handles point at the same stored array
    pub fn same_array(&self, other: &ProbeArray) -> bool {
        Arc::ptr_eq(&self.probes, &other.probes)
    }
}

impl fmt::Debug for ProbeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeArray")
            .field("len", &self.len())
            .field("hits", &self.snapshot().iter().filter(|&&p| p).count())
            .finish()
    }
}
