//! # Merge Engine
//!
//! Combines execution data captured across runs into one consistent set.
//!
//! - The first occurrence of a class id fixes its probe count
//! - Later occurrences with the same count are OR-ed in (coverage only grows)
//! - A later occurrence with a different count aborts the whole merge with
//!   [`DataError::StructuralMismatch`](crate::DataError::StructuralMismatch)
//! - Sessions are concatenated in input order
//! - Class order in the output is first-seen order across all inputs

use crate::{DataResult, ExecutionDataSet};

/// Merge any number of data sets into a fresh one
///
/// Inputs are not modified. On error nothing is returned, so callers never
/// observe a partially merged result.
pub fn merge<'a, I>(sets: I) -> DataResult<ExecutionDataSet>
where
    I: IntoIterator<Item = &'a ExecutionDataSet>,
{
    let mut out = ExecutionDataSet::new();
    for set in sets {
        for session in set.sessions() {
            out.add_session(session.clone());
        }
        for data in set {
            out.merge_in(data.clone())?;
        }
    }
    Ok(out)
}
