//! Controller that never emits anything

use super::{AgentController, ControllerState};
use crate::Result;
use agent_config::AgentOptions;
use async_trait::async_trait;
use runtime::ProbeStore;
use std::sync::Arc;

#[derive(Debug)]
pub struct NopController {
    state: ControllerState,
}

impl NopController {
    pub fn new() -> Self {
        Self {
            state: ControllerState::Stopped,
        }
    }
}

impl Default for NopController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentController for NopController {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn startup(&mut self, _options: &AgentOptions, _store: Arc<ProbeStore>) -> Result<()> {
        self.state = ControllerState::Running;
        Ok(())
    }

    async fn write_execution_data(&self, _reset: bool) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state = ControllerState::Stopped;
        Ok(())
    }

    fn state(&self) -> ControllerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_everything_succeeds() {
        let mut controller = NopController::new();
        // Writes are accepted even before startup
        controller.write_execution_data(true).await.unwrap();
        controller
            .startup(&AgentOptions::default(), Arc::new(ProbeStore::default()))
            .await
            .unwrap();
        assert_eq!(controller.state(), ControllerState::Running);
        controller.shutdown().await.unwrap();
        controller.shutdown().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Stopped);
    }
}
