//! Coverage Transport Infrastructure
//!
//! Moves execution data out of the instrumented process. The [`Agent`] owns
//! the probe store and one controller chosen by the output mode:
//!
//! - **file**: dumps are written to a local exec file
//! - **tcpserver**: dump clients connect and pull snapshots
//! - **tcpclient**: snapshots are pushed to a collector
//! - **management**: in-process access through a [`ManagementRegistry`]
//! - **none**: data is collected but never emitted
//!
//! The [`tools`] module holds the other side of these transports: a dump
//! client, a collector for pushing agents and an exec file loader.

pub mod agent;
pub mod connection;
pub mod controllers;
pub mod error;
pub mod management;
pub mod tools;

pub use agent::Agent;
pub use connection::{RecordReader, RecordWriter, RetryPolicy};
pub use controllers::{
    create_controller, AgentController, ControllerState, LocalController, ManagementController,
    NopController, TcpClientController, TcpServerController,
};
pub use error::{Result, TransportError};
pub use management::{ManagementAgent, ManagementRegistry, MANAGEMENT_NAME};
pub use tools::{DumpClient, ExecFileLoader, ExecutionDataReceiver};
