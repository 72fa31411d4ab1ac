//! Coverage agent
//!
//! Ties one [`ProbeStore`] to the controller selected by
//! [`AgentOptions::output`] and drives its lifecycle. Instrumented code
//! registers classes through [`Agent::store`]; everything else goes through
//! the agent.

use crate::controllers::{create_controller, AgentController, ControllerState};
use crate::management::{self, ManagementAgent, ManagementRegistry, MANAGEMENT_NAME};
use crate::Result;
use agent_config::{AgentOptions, OutputMode};
use bytes::Bytes;
use codec::encode_data_set;
use runtime::ProbeStore;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Agent {
    options: AgentOptions,
    store: Arc<ProbeStore>,
    registry: Arc<ManagementRegistry>,
    controller: Box<dyn AgentController>,
    management_registered: bool,
}

impl Agent {
    /// Agent with a private management registry
    pub fn new(options: AgentOptions) -> Self {
        Self::with_registry(options, Arc::new(ManagementRegistry::new()))
    }

    /// Agent configured from an option string such as
    /// `output=tcpserver,port=6300`
    pub fn from_option_string(options: &str) -> Result<Self> {
        Ok(Self::new(options.parse::<AgentOptions>()?))
    }

    pub fn with_registry(options: AgentOptions, registry: Arc<ManagementRegistry>) -> Self {
        let controller = create_controller(options.output, registry.clone());
        Self {
            options,
            store: Arc::new(ProbeStore::default()),
            registry,
            controller,
            management_registered: false,
        }
    }

    /// Set the session id, start the controller and register for management
    pub async fn startup(&mut self) -> Result<()> {
        let session_id = self
            .options
            .sessionid
            .clone()
            .unwrap_or_else(create_session_id);
        self.store.set_session_id(session_id.as_str());

        self.controller
            .startup(&self.options, self.store.clone())
            .await?;

        // Management output registers the same agent itself
        if self.options.jmx && self.options.output != OutputMode::Management {
            let agent = Arc::new(ManagementAgent::new(self.store.clone()));
            if let Err(e) = self.registry.register(MANAGEMENT_NAME, agent) {
                self.controller.shutdown().await?;
                return Err(e);
            }
            self.management_registered = true;
        }

        info!(
            output = %self.options.output,
            session = %session_id,
            "Coverage agent started"
        );
        Ok(())
    }

    /// Final dump if configured, then release every resource
    ///
    /// Every step runs even if an earlier one failed; the first error is
    /// returned.
    pub async fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;

        if self.options.dumponexit && self.controller.state() == ControllerState::Running {
            if let Err(e) = self.controller.write_execution_data(false).await {
                warn!("Final dump failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.controller.shutdown().await {
            warn!("Controller shutdown failed: {}", e);
            first_error.get_or_insert(e);
        }
        if self.management_registered {
            self.registry.unregister(MANAGEMENT_NAME);
            self.management_registered = false;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Ask the controller to emit the current execution data
    pub async fn dump(&self, reset: bool) -> Result<()> {
        self.controller.write_execution_data(reset).await
    }

    pub fn reset(&self) {
        self.store.reset();
    }

    /// Current execution data as an encoded stream
    pub fn execution_data(&self, reset: bool) -> Result<Bytes> {
        Ok(encode_data_set(&self.store.snapshot(reset))?)
    }

    pub fn session_id(&self) -> String {
        self.store.session_id()
    }

    pub fn set_session_id(&self, id: impl Into<String>) {
        self.store.set_session_id(id);
    }

    pub fn version(&self) -> &'static str {
        management::version()
    }

    pub fn store(&self) -> &Arc<ProbeStore> {
        &self.store
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn controller(&self) -> &dyn AgentController {
        self.controller.as_ref()
    }
}

/// `<host>-<random hex>`
fn create_session_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknownhost".to_string());
    format!("{}-{:x}", host, rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportError;
    use types::ClassId;

    #[test]
    fn test_generated_session_id() {
        let id = create_session_id();
        let (host, suffix) = id.rsplit_once('-').unwrap();
        assert!(!host.is_empty());
        assert!(u32::from_str_radix(suffix, 16).is_ok());
    }

    #[test]
    fn test_from_option_string() {
        let agent = Agent::from_option_string("output=none,sessionid=cli").unwrap();
        assert_eq!(agent.options().output, OutputMode::None);
        assert_eq!(agent.controller().name(), "none");

        let err = Agent::from_option_string("output=none,bogus=1").err().unwrap();
        assert_eq!(err.category(), "configuration");
        assert!(matches!(
            err,
            TransportError::Configuration { field: Some(ref f), .. } if f == "bogus"
        ));

        let err = Agent::from_option_string("output=carrier-pigeon").err().unwrap();
        assert!(matches!(
            err,
            TransportError::Configuration { field: Some(ref f), .. } if f == "output"
        ));
    }

    #[tokio::test]
    async fn test_configured_session_id() {
        let mut agent = Agent::new("output=none,sessionid=build-42".parse().unwrap());
        agent.startup().await.unwrap();
        assert_eq!(agent.session_id(), "build-42");
        agent.set_session_id("build-43");
        assert_eq!(agent.store().session_id(), "build-43");
        agent.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_execution_data_without_output() {
        let mut agent = Agent::new("output=none".parse().unwrap());
        agent.startup().await.unwrap();

        let probes = agent.store().register(ClassId::new(5), "Five", 2).unwrap();
        probes.hit(1);

        let set = codec::read_data_set(&agent.execution_data(true).unwrap()).unwrap();
        assert_eq!(set.get(ClassId::new(5)).unwrap().probes(), &[false, true]);
        assert_eq!(probes.get(1), Some(false));

        probes.hit(0);
        agent.reset();
        assert_eq!(probes.get(0), Some(false));
        agent.dump(true).await.unwrap();
        agent.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_jmx_registration() {
        let registry = Arc::new(ManagementRegistry::new());
        let mut agent =
            Agent::with_registry("output=none,jmx=true".parse().unwrap(), registry.clone());
        agent.startup().await.unwrap();

        let management = registry.get(MANAGEMENT_NAME).unwrap();
        assert_eq!(management.session_id(), agent.session_id());
        assert_eq!(management.version(), agent.version());

        agent.shutdown().await.unwrap();
        assert!(!registry.contains(MANAGEMENT_NAME));
    }

    #[tokio::test]
    async fn test_management_output_with_jmx_registers_once() {
        let registry = Arc::new(ManagementRegistry::new());
        let mut agent = Agent::with_registry(
            "output=management,jmx=true".parse().unwrap(),
            registry.clone(),
        );
        agent.startup().await.unwrap();
        assert_eq!(registry.names(), vec![MANAGEMENT_NAME.to_string()]);
        agent.shutdown().await.unwrap();
        assert!(registry.names().is_empty());
    }
}
