//! File output
//!
//! Each dump writes a complete stream (header, session, classes) to the
//! destination file, appending to or replacing what is there. Concurrent
//! dumps are serialized so their bytes never interleave.

use super::{AgentController, ControllerState};
use crate::{Result, TransportError};
use agent_config::AgentOptions;
use async_trait::async_trait;
use codec::encode_data_set;
use runtime::ProbeStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

struct Running {
    store: Arc<ProbeStore>,
    destfile: PathBuf,
    append: bool,
}

pub struct LocalController {
    running: Option<Running>,
    file_lock: Mutex<()>,
}

impl LocalController {
    pub fn new() -> Self {
        Self {
            running: None,
            file_lock: Mutex::new(()),
        }
    }

    /// Destination file while running
    pub fn destfile(&self) -> Option<&Path> {
        self.running.as_ref().map(|r| r.destfile.as_path())
    }

    async fn open(path: &Path, append: bool) -> Result<fs::File> {
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        options
            .open(path)
            .await
            .map_err(|e| TransportError::io(format!("Failed to open {}", path.display()), e))
    }
}

impl Default for LocalController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentController for LocalController {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn startup(&mut self, options: &AgentOptions, store: Arc<ProbeStore>) -> Result<()> {
        let destfile = options.destfile.clone();
        if let Some(parent) = destfile.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                TransportError::io(format!("Failed to create {}", parent.display()), e)
            })?;
        }
        // Fail early if the file cannot be written
        Self::open(&destfile, options.append).await?;

        info!("Execution data file: {}", destfile.display());
        self.running = Some(Running {
            store,
            destfile,
            append: options.append,
        });
        Ok(())
    }

    async fn write_execution_data(&self, reset: bool) -> Result<()> {
        let running = self
            .running
            .as_ref()
            .ok_or(TransportError::NotRunning { controller: "file" })?;

        let _guard = self.file_lock.lock().await;
        let set = running.store.snapshot(reset);
        let bytes = encode_data_set(&set)?;
        let mut file = Self::open(&running.destfile, running.append).await?;
        file.write_all(&bytes).await.map_err(|e| {
            TransportError::io(format!("Failed to write {}", running.destfile.display()), e)
        })?;
        file.flush().await?;
        debug!(
            file = %running.destfile.display(),
            classes = set.len(),
            bytes = bytes.len(),
            "Wrote execution data"
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.running = None;
        Ok(())
    }

    fn state(&self) -> ControllerState {
        if self.running.is_some() {
            ControllerState::Running
        } else {
            ControllerState::Stopped
        }
    }
}
