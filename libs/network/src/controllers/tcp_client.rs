//! TCP client output
//!
//! Connects to a collector at startup and pushes a snapshot on every dump.
//! The collector may also send CMD_DUMP at any time; a background task
//! answers those on the same connection.
//!
//! When a write fails the connection is marked broken and the next dump
//! makes a single reconnect attempt. Nothing is buffered while the collector
//! is unreachable: a dump that cannot be delivered is dropped with a warning
//! and the probes are left as they were.

use super::{AgentController, ControllerState};
use crate::connection::{split_tcp, RecordReader, RecordWriter, RetryPolicy};
use crate::{Result, TransportError};
use agent_config::AgentOptions;
use async_trait::async_trait;
use codec::Record;
use runtime::ProbeStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Live connection; the generation tells reader tasks apart across reconnects
struct Connection {
    generation: u64,
    writer: RecordWriter<OwnedWriteHalf>,
}

type SharedConnection = Arc<Mutex<Option<Connection>>>;

struct Running {
    store: Arc<ProbeStore>,
    address: String,
    port: u16,
    connection: SharedConnection,
    generation: AtomicU64,
    reader_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Running {
    /// Connect, send the header and start answering collector commands
    async fn open(&self, policy: &RetryPolicy) -> Result<Connection> {
        let stream = policy.connect(&self.address, self.port).await?;
        let (reader, mut writer) = split_tcp(stream);
        writer.send_header().await?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let task = tokio::spawn(serve_commands(
            reader,
            self.store.clone(),
            self.connection.clone(),
            generation,
        ));
        if let Some(previous) = self.reader_task.lock().replace(task) {
            previous.abort();
        }

        info!(
            generation,
            "Connected to collector at {}:{}", self.address, self.port
        );
        Ok(Connection { generation, writer })
    }
}

pub struct TcpClientController {
    running: Option<Running>,
}

impl TcpClientController {
    pub fn new() -> Self {
        Self { running: None }
    }

    /// Whether a connection to the collector is currently believed healthy
    pub async fn is_connected(&self) -> bool {
        match &self.running {
            Some(running) => running.connection.lock().await.is_some(),
            None => false,
        }
    }
}

impl Default for TcpClientController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentController for TcpClientController {
    fn name(&self) -> &'static str {
        "tcpclient"
    }

    async fn startup(&mut self, options: &AgentOptions, store: Arc<ProbeStore>) -> Result<()> {
        let running = Running {
            store,
            address: options.connect_address().to_string(),
            port: options.port,
            connection: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            reader_task: parking_lot::Mutex::new(None),
        };

        let policy = RetryPolicy::new(options.retry_count, options.retry_delay());
        let connection = running.open(&policy).await?;
        *running.connection.lock().await = Some(connection);

        self.running = Some(running);
        Ok(())
    }

    async fn write_execution_data(&self, reset: bool) -> Result<()> {
        let running = self
            .running
            .as_ref()
            .ok_or(TransportError::NotRunning {
                controller: "tcpclient",
            })?;

        let mut guard = running.connection.lock().await;
        if guard.is_none() {
            match running.open(&RetryPolicy::new(0, Default::default())).await {
                Ok(connection) => *guard = Some(connection),
                Err(e) => {
                    warn!(
                        category = e.category(),
                        "Collector unreachable, execution data not sent: {}", e
                    );
                    return Ok(());
                }
            }
        }

        let Some(connection) = guard.as_mut() else {
            return Ok(());
        };
        let set = running.store.snapshot(reset);
        if let Err(e) = connection.writer.send_data_set(&set).await {
            warn!(
                generation = connection.generation,
                "Failed to push execution data, dropping connection: {}", e
            );
            *guard = None;
            return Ok(());
        }
        debug!(classes = set.len(), reset, "Pushed execution data");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        if let Some(task) = running.reader_task.lock().take() {
            task.abort();
        }
        if let Some(mut connection) = running.connection.lock().await.take() {
            if let Err(e) = connection.writer.shutdown().await {
                debug!("Error closing collector connection: {}", e);
            }
        }
        info!("Disconnected from collector");
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

/// Answer collector commands until the connection ends
async fn serve_commands(
    mut reader: RecordReader<OwnedReadHalf>,
    store: Arc<ProbeStore>,
    connection: SharedConnection,
    generation: u64,
) {
    let outcome: Result<()> = async {
        while let Some(record) = reader.next_record().await? {
            match record {
                Record::Header { .. } => {}
                Record::DumpCommand { dump, reset } => {
                    let mut guard = connection.lock().await;
                    let Some(current) = guard.as_mut().filter(|c| c.generation == generation)
                    else {
                        return Ok(());
                    };
                    if dump {
                        let set = store.snapshot(reset);
                        current.writer.send_data_set(&set).await?;
                    } else {
                        if reset {
                            store.reset();
                        }
                        current.writer.send_command_ok().await?;
                    }
                    debug!(generation, dump, reset, "Answered collector command");
                }
                other => {
                    warn!(
                        generation,
                        "Ignoring unexpected block type {:#04x} from collector",
                        other.block_type()
                    );
                }
            }
        }
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => debug!(generation, "Collector closed the connection"),
        Err(e) => warn!(generation, "Collector connection failed: {}", e),
    }

    let mut guard = connection.lock().await;
    if guard.as_ref().is_some_and(|c| c.generation == generation) {
        *guard = None;
    }
}
