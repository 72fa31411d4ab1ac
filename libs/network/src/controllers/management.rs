//! Management-only output
//!
//! Registers the runtime's management agent and otherwise stays silent:
//! data only leaves the process when someone calls the agent.

use super::{AgentController, ControllerState};
use crate::management::{ManagementAgent, ManagementRegistry, MANAGEMENT_NAME};
use crate::{Result, TransportError};
use agent_config::AgentOptions;
use async_trait::async_trait;
use runtime::ProbeStore;
use std::sync::Arc;

pub struct ManagementController {
    registry: Arc<ManagementRegistry>,
    registered: bool,
}

impl ManagementController {
    pub fn new(registry: Arc<ManagementRegistry>) -> Self {
        Self {
            registry,
            registered: false,
        }
    }
}

#[async_trait]
impl AgentController for ManagementController {
    fn name(&self) -> &'static str {
        "management"
    }

    async fn startup(&mut self, _options: &AgentOptions, store: Arc<ProbeStore>) -> Result<()> {
        let agent = Arc::new(ManagementAgent::new(store));
        self.registry.register(MANAGEMENT_NAME, agent)?;
        self.registered = true;
        Ok(())
    }

    async fn write_execution_data(&self, _reset: bool) -> Result<()> {
        if !self.registered {
            return Err(TransportError::NotRunning {
                controller: "management",
            });
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if self.registered {
            self.registry.unregister(MANAGEMENT_NAME);
            self.registered = false;
        }
        Ok(())
    }

    fn state(&self) -> ControllerState {
        if self.registered {
            ControllerState::Running
        } else {
            ControllerState::Stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registers_for_lifetime() {
        let registry = Arc::new(ManagementRegistry::new());
        let mut controller = ManagementController::new(registry.clone());

        controller
            .startup(&AgentOptions::default(), Arc::new(ProbeStore::new("s")))
            .await
            .unwrap();
        assert!(registry.contains(MANAGEMENT_NAME));
        controller.write_execution_data(true).await.unwrap();

        controller.shutdown().await.unwrap();
        assert!(!registry.contains(MANAGEMENT_NAME));
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[tokio::test]
    async fn test_second_registration_fails() {
        let registry = Arc::new(ManagementRegistry::new());
        let store = Arc::new(ProbeStore::new("s"));
        let mut first = ManagementController::new(registry.clone());
        let mut second = ManagementController::new(registry.clone());

        first
            .startup(&AgentOptions::default(), store.clone())
            .await
            .unwrap();
        let err = second
            .startup(&AgentOptions::default(), store)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "registration");

        // The failed controller must not remove the first registration
        second.shutdown().await.unwrap();
        assert!(registry.contains(MANAGEMENT_NAME));
    }
}
