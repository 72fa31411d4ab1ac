//! # covrt Probe Store
//!
//! In-process home of all live execution data. Instrumented classes register
//! once and receive a [`ProbeArray`]; controllers take [`ExecutionDataSet`]
//! snapshots from the shared [`ProbeStore`].
//!
//! ## Performance Profile
//!
//! - **Probe write**: one relaxed atomic store, no lock
//! - **Register (known class)**: shared read lock plus a map lookup
//! - **Snapshot**: shared read lock for the copy; registrations wait, probe
//!   writes do not
//!
//! [`ExecutionDataSet`]: types::ExecutionDataSet

pub mod probes;
pub mod session;
pub mod store;

pub use probes::ProbeArray;
pub use session::{now_millis, Session};
pub use store::ProbeStore;
