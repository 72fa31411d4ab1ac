//! Per-class probe snapshots and session descriptors

use crate::{ClassId, DataError, DataResult};
use std::fmt;

/// Snapshot of the probes of one class
///
/// Owned, plain data. The live, concurrently written form lives in the
/// runtime crate; this is what gets serialized, merged and analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionData {
    id: ClassId,
    name: String,
    probes: Vec<bool>,
}

impl ExecutionData {
    /// Create execution data from an existing probe snapshot
    pub fn new(id: ClassId, name: impl Into<String>, probes: Vec<bool>) -> Self {
        Self {
            id,
            name: name.into(),
            probes,
        }
    }

    /// Create execution data with `probe_count` unexecuted probes
    pub fn with_probe_count(id: ClassId, name: impl Into<String>, probe_count: usize) -> Self {
        Self::new(id, name, vec![false; probe_count])
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    /// VM name of the class, e.g. `com/example/Foo`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probes(&self) -> &[bool] {
        &self.probes
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// True if at least one probe has been executed
    pub fn has_hits(&self) -> bool {
        self.probes.iter().any(|&p| p)
    }

    /// Number of executed probes
    pub fn hit_count(&self) -> usize {
        self.probes.iter().filter(|&&p| p).count()
    }

    pub fn reset(&mut self) {
        self.probes.fill(false);
    }

    /// Fail with [`DataError::StructuralMismatch`] unless `other` describes
    /// the same class: same name and same probe count
    pub fn assert_compatible(&self, other: &ExecutionData) -> DataResult<()> {
        if self.name != other.name {
            return Err(DataError::name_mismatch(
                self.id,
                self.name.clone(),
                other.name.clone(),
            ));
        }
        if self.probes.len() != other.probes.len() {
            return Err(DataError::structural_mismatch(
                self.id,
                self.name.clone(),
                self.probes.len(),
                other.probes.len(),
            ));
        }
        Ok(())
    }

    /// Combine `other` into this entry by elementwise logical OR
    ///
    /// Coverage is monotonic: a probe that is true here stays true.
    pub fn merge(&mut self, other: &ExecutionData) -> DataResult<()> {
        self.assert_compatible(other)?;
        for (mine, theirs) in self.probes.iter_mut().zip(&other.probes) {
            *mine |= *theirs;
        }
        Ok(())
    }

    /// Clear every probe that is executed in `other`
    ///
    /// Used for differential coverage ("what did this run add?").
    pub fn subtract(&mut self, other: &ExecutionData) -> DataResult<()> {
        self.assert_compatible(other)?;
        for (mine, theirs) in self.probes.iter_mut().zip(&other.probes) {
            if *theirs {
                *mine = false;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionData[name={}, id={}]", self.name, self.id)
    }
}

/// Identifies one process run's worth of collected coverage data
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionInfo {
    id: String,
    start: i64,
    dump: i64,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>, start: i64, dump: i64) -> Self {
        Self {
            id: id.into(),
            start,
            dump,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Time the session started (or was last reset)
    pub fn start_time(&self) -> i64 {
        self.start
    }

    /// Time the data was collected
    pub fn dump_time(&self) -> i64 {
        self.dump
    }
}
