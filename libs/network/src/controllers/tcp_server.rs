//! TCP server output
//!
//! Listens for dump clients. Each accepted connection is served by its own
//! task: the server sends its header, waits for the client's header and one
//! CMD_DUMP, answers with a snapshot followed by CMD_OK and closes. A broken
//! connection only ends its own handler.

use super::{AgentController, ControllerState};
use crate::connection::split_tcp;
use crate::{Result, TransportError};
use agent_config::AgentOptions;
use async_trait::async_trait;
use codec::Record;
use runtime::ProbeStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use types::ExecutionDataSet;

/// How long a client may take to send its header and command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// How long shutdown waits for in-flight handlers before aborting them
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

struct Running {
    store: Arc<ProbeStore>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

pub struct TcpServerController {
    running: Option<Running>,
    command_timeout: Duration,
    grace_period: Duration,
}

impl TcpServerController {
    pub fn new() -> Self {
        Self {
            running: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Bound listener address while running; useful with port 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }
}

impl Default for TcpServerController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentController for TcpServerController {
    fn name(&self) -> &'static str {
        "tcpserver"
    }

    async fn startup(&mut self, options: &AgentOptions, store: Arc<ProbeStore>) -> Result<()> {
        let address = options.bind_address();
        let listener = TcpListener::bind((address, options.port))
            .await
            .map_err(|e| {
                TransportError::io(format!("Failed to bind {}:{}", address, options.port), e)
            })?;
        let local_addr = listener.local_addr()?;
        info!("Listening for dump clients on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            store.clone(),
            shutdown_rx,
            self.command_timeout,
            self.grace_period,
        ));

        self.running = Some(Running {
            store,
            local_addr,
            shutdown_tx,
            accept_task,
        });
        Ok(())
    }

    /// Clients pull data themselves, so only a requested reset has an effect
    async fn write_execution_data(&self, reset: bool) -> Result<()> {
        let running = self
            .running
            .as_ref()
            .ok_or(TransportError::NotRunning {
                controller: "tcpserver",
            })?;
        if reset {
            running.store.reset();
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.accept_task.await {
            if e.is_panic() {
                error!("Accept loop panicked: {}", e);
            }
        }
        info!("Stopped listening on {}", running.local_addr);
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

async fn accept_loop(
    listener: TcpListener,
    store: Arc<ProbeStore>,
    mut shutdown_rx: watch::Receiver<bool>,
    command_timeout: Duration,
    grace_period: Duration,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Accepted dump client");
                    let store = store.clone();
                    handlers.spawn(async move {
                        if let Err(e) = handle_connection(stream, store, command_timeout).await {
                            warn!(peer = %peer, category = e.category(), "Dump client failed: {}", e);
                        }
                    });
                }
                Err(e) => {
                    // Usually descriptor exhaustion; back off instead of spinning
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!("Connection handler panicked: {}", e);
                    }
                }
            }
        }
    }

    drop(listener);

    let drain = async { while handlers.join_next().await.is_some() {} };
    if tokio::time::timeout(grace_period, drain).await.is_err() {
        warn!(
            remaining = handlers.len(),
            "Connection handlers still running after {:?}, aborting", grace_period
        );
        handlers.abort_all();
        while handlers.join_next().await.is_some() {}
    }
}

async fn handle_connection(
    stream: TcpStream,
    store: Arc<ProbeStore>,
    command_timeout: Duration,
) -> Result<()> {
    let (mut reader, mut writer) = split_tcp(stream);
    writer.send_header().await?;
    reader.expect_header(command_timeout).await?;

    match reader.next_record_timeout(command_timeout).await? {
        Some(Record::DumpCommand { dump, reset }) => {
            let set = if dump {
                store.snapshot(reset)
            } else {
                if reset {
                    store.reset();
                }
                ExecutionDataSet::new()
            };
            writer.send_data_set(&set).await?;
            debug!(
                peer = ?reader.peer_addr(),
                dump,
                reset,
                classes = set.len(),
                "Answered dump command"
            );
        }
        Some(other) => {
            return Err(TransportError::protocol(format!(
                "Expected dump command, got block type {:#04x}",
                other.block_type()
            )));
        }
        None => {
            return Err(TransportError::connection(
                "Connection closed before dump command",
                reader.peer_addr(),
            ));
        }
    }

    writer.shutdown().await
}
