//! Error types for probe registration and data set merging
//!
//! Both variants are structural faults: they are surfaced synchronously to the
//! caller that triggered them and never resolved silently.

use crate::ClassId;
use std::fmt;
use thiserror::Error;

/// What two descriptions of the same class id disagree on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    ProbeCount { expected: usize, actual: usize },
    ClassName { expected: String, actual: String },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::ProbeCount { expected, actual } => {
                write!(f, "expected {expected} probes, got {actual}")
            }
            Conflict::ClassName { expected, actual } => {
                write!(f, "different class names {expected} and {actual}")
            }
        }
    }
}

/// Errors raised while registering or combining execution data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// A class id is already registered for a different class.
    ///
    /// Two structurally distinct classes hashed to the same id. Fatal to
    /// instrumenting that one class; the process keeps running.
    #[error("Class id collision for {class_id} ({class_name}): {conflict}")]
    ClassIdCollision {
        class_id: ClassId,
        class_name: String,
        conflict: Conflict,
    },

    /// Two data sets disagree on the shape of one class id.
    ///
    /// Fatal to the merge call only; no partial output is produced.
    #[error("Incompatible execution data for class {class_name} with id {class_id}: {conflict}")]
    StructuralMismatch {
        class_id: ClassId,
        class_name: String,
        conflict: Conflict,
    },
}

/// Result type for data model operations
pub type DataResult<T> = std::result::Result<T, DataError>;

impl DataError {
    /// Create a registration collision on the probe count
    pub fn collision(
        class_id: ClassId,
        class_name: impl Into<String>,
        registered: usize,
        requested: usize,
    ) -> Self {
        Self::ClassIdCollision {
            class_id,
            class_name: class_name.into(),
            conflict: Conflict::ProbeCount {
                expected: registered,
                actual: requested,
            },
        }
    }

    /// Create a registration collision on the class name
    pub fn name_collision(
        class_id: ClassId,
        registered: impl Into<String>,
        requested: impl Into<String>,
    ) -> Self {
        let registered = registered.into();
        Self::ClassIdCollision {
            class_id,
            class_name: registered.clone(),
            conflict: Conflict::ClassName {
                expected: registered,
                actual: requested.into(),
            },
        }
    }

    /// Create a merge-time probe count mismatch
    pub fn structural_mismatch(
        class_id: ClassId,
        class_name: impl Into<String>,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::StructuralMismatch {
            class_id,
            class_name: class_name.into(),
            conflict: Conflict::ProbeCount { expected, actual },
        }
    }

    /// Create a merge-time class name mismatch
    pub fn name_mismatch(
        class_id: ClassId,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let expected = expected.into();
        Self::StructuralMismatch {
            class_id,
            class_name: expected.clone(),
            conflict: Conflict::ClassName {
                expected,
                actual: actual.into(),
            },
        }
    }

    /// Class id the error refers to
    pub fn class_id(&self) -> ClassId {
        match self {
            Self::ClassIdCollision { class_id, .. } | Self::StructuralMismatch { class_id, .. } => {
                *class_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = DataError::collision(ClassId::new(0xABCD), "com/example/Foo", 3, 5);
        let text = err.to_string();
        assert!(text.contains("000000000000abcd"));
        assert!(text.contains("com/example/Foo"));
        assert!(text.contains("3 probes"));
        assert_eq!(err.class_id(), ClassId::new(0xABCD));

        let err = DataError::structural_mismatch(ClassId::new(1), "Bar", 2, 4);
        assert!(err.to_string().contains("expected 2 probes, got 4"));

        let err = DataError::name_collision(ClassId::new(1), "com/a/Alpha", "com/b/Beta");
        assert!(err
            .to_string()
            .contains("different class names com/a/Alpha and com/b/Beta"));
    }
}
