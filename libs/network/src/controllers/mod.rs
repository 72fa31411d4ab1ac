//! # Transport Controllers
//!
//! A controller decides how execution data leaves the process. Every variant
//! follows the same lifecycle:
//!
//! ```text
//! Stopped ──startup──→ Running ──shutdown──→ Stopped
//!                        │
//!              write_execution_data(reset)
//! ```
//!
//! A failed startup is returned to the caller and leaves the controller
//! Stopped; shutdown is safe after a partial startup and may be repeated.

pub mod local;
pub mod management;
pub mod nop;
pub mod tcp_client;
pub mod tcp_server;

pub use local::LocalController;
pub use management::ManagementController;
pub use nop::NopController;
pub use tcp_client::TcpClientController;
pub use tcp_server::TcpServerController;

use crate::management::ManagementRegistry;
use crate::Result;
use agent_config::{AgentOptions, OutputMode};
use async_trait::async_trait;
use runtime::ProbeStore;
use std::sync::Arc;

/// Lifecycle state shared by all controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Running,
}

/// Output strategy for collected execution data
#[async_trait]
pub trait AgentController: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Acquire resources (files, sockets, registrations)
    async fn startup(&mut self, options: &AgentOptions, store: Arc<ProbeStore>) -> Result<()>;

    /// Emit the current execution data, optionally resetting the probes
    async fn write_execution_data(&self, reset: bool) -> Result<()>;

    /// Release every resource acquired by startup
    async fn shutdown(&mut self) -> Result<()>;

    fn state(&self) -> ControllerState;
}

/// Create the controller for an output mode
pub fn create_controller(
    mode: OutputMode,
    registry: Arc<ManagementRegistry>,
) -> Box<dyn AgentController> {
    match mode {
        OutputMode::File => Box::new(LocalController::new()),
        OutputMode::TcpServer => Box::new(TcpServerController::new()),
        OutputMode::TcpClient => Box::new(TcpClientController::new()),
        OutputMode::Management => Box::new(ManagementController::new(registry)),
        OutputMode::None => Box::new(NopController::new()),
    }
}
