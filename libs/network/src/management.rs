//! In-process management access
//!
//! A [`ManagementRegistry`] maps names to [`ManagementAgent`]s so tooling in
//! the same process can dump, reset or relabel the runtime without a socket.
//! The registry is injected; nothing here is a process global.

use crate::{Result, TransportError};
use bytes::Bytes;
use codec::encode_data_set;
use parking_lot::RwLock;
use runtime::ProbeStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name the runtime's management agent is registered under
pub const MANAGEMENT_NAME: &str = "coverage:type=Runtime";

/// Crate version reported by management agents
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Management view of one probe store
#[derive(Debug)]
pub struct ManagementAgent {
    store: Arc<ProbeStore>,
}

impl ManagementAgent {
    pub fn new(store: Arc<ProbeStore>) -> Self {
        Self { store }
    }

    /// Encoded execution data stream of the current probes
    pub fn dump(&self, reset: bool) -> Result<Bytes> {
        let set = self.store.snapshot(reset);
        Ok(encode_data_set(&set)?)
    }

    pub fn reset(&self) {
        self.store.reset();
    }

    pub fn session_id(&self) -> String {
        self.store.session_id()
    }

    pub fn set_session_id(&self, id: impl Into<String>) {
        self.store.set_session_id(id);
    }

    pub fn version(&self) -> &'static str {
        version()
    }
}

/// Named management agents
#[derive(Debug, Default)]
pub struct ManagementRegistry {
    agents: RwLock<HashMap<String, Arc<ManagementAgent>>>,
}

impl ManagementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent; a name can only be taken once
    pub fn register(&self, name: &str, agent: Arc<ManagementAgent>) -> Result<()> {
        let mut agents = self.agents.write();
        if agents.contains_key(name) {
            return Err(TransportError::registration(name, "already registered"));
        }
        agents.insert(name.to_string(), agent);
        info!("Registered management agent '{}'", name);
        Ok(())
    }

    /// Remove an agent; returns false if the name was not registered
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.agents.write().remove(name).is_some();
        if removed {
            debug!("Unregistered management agent '{}'", name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManagementAgent>> {
        self.agents.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.read().keys().cloned().collect()
    }
}
