//! Tooling built on the transport layer: remote dumps, a collector for
//! pushing agents, and exec file handling.

pub mod dump_client;
pub mod file_loader;
pub mod receiver;

pub use dump_client::DumpClient;
pub use file_loader::ExecFileLoader;
pub use receiver::ExecutionDataReceiver;
