//! # covrt Execution Data Types
//!
//! Pure data structures shared by every layer of the collection runtime.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → codec/ → runtime/ → network/
//!     ↑          ↓          ↓          ↓
//! Pure Data   Wire and   Live probe  Controllers
//! + Merge     file format  registry   and agent
//! ```
//!
//! ## What This Crate Contains
//! - [`ClassId`]: structural 64-bit class identifier
//! - [`ExecutionData`]: probe snapshot for one class
//! - [`SessionInfo`]: one process run
//! - [`ExecutionDataSet`]: the unit exchanged over any transport or file
//! - [`merge`]: combining data sets by monotonic logical OR
//!
//! ## What This Crate Does NOT Contain
//! - Encoding/decoding (belongs in codec/)
//! - Live, concurrently written probe arrays (belongs in runtime/)

pub mod common;
pub mod data_set;
pub mod execution;
pub mod merge;

pub use common::errors::{Conflict, DataError, DataResult};
pub use common::identifiers::ClassId;
pub use data_set::ExecutionDataSet;
pub use execution::{ExecutionData, SessionInfo};
pub use merge::merge;
