//! Collector for agents running in tcpclient mode
//!
//! Every connected agent pushes snapshots terminated by CMD_OK. Each push is
//! merged into one shared data set; a push that conflicts structurally with
//! what was already collected is rejected as a whole and logged.

use crate::connection::{split_tcp, RecordWriter};
use crate::{Result, TransportError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use types::ExecutionDataSet;

/// How long a freshly connected agent may take to send its header
const HEADER_TIMEOUT: Duration = Duration::from_secs(10);

type AgentWriter = Arc<tokio::sync::Mutex<RecordWriter<OwnedWriteHalf>>>;

struct Shared {
    data: Mutex<ExecutionDataSet>,
    agents: Mutex<HashMap<u64, AgentWriter>>,
    agent_count: watch::Sender<usize>,
    push_count: watch::Sender<u64>,
}

impl Shared {
    fn add_agent(&self, id: u64, writer: AgentWriter) {
        let mut agents = self.agents.lock();
        agents.insert(id, writer);
        self.agent_count.send_replace(agents.len());
    }

    fn remove_agent(&self, id: u64) {
        let mut agents = self.agents.lock();
        agents.remove(&id);
        self.agent_count.send_replace(agents.len());
    }
}

pub struct ExecutionDataReceiver {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl ExecutionDataReceiver {
    /// Listen for agents on `address:port`; port 0 picks a free port
    pub async fn bind(address: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((address, port))
            .await
            .map_err(|e| TransportError::io(format!("Failed to bind {address}:{port}"), e))?;
        let local_addr = listener.local_addr()?;
        info!("Collecting execution data on {}", local_addr);

        let shared = Arc::new(Shared {
            data: Mutex::new(ExecutionDataSet::new()),
            agents: Mutex::new(HashMap::new()),
            agent_count: watch::channel(0).0,
            push_count: watch::channel(0).0,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(listener, shared.clone(), shutdown_rx));

        Ok(Self {
            shared,
            local_addr,
            shutdown_tx,
            accept_task: Some(accept_task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Copy of everything collected so far
    pub fn data(&self) -> ExecutionDataSet {
        self.shared.data.lock().clone()
    }

    /// Everything collected so far, leaving the receiver empty
    pub fn take_data(&self) -> ExecutionDataSet {
        std::mem::take(&mut *self.shared.data.lock())
    }

    /// Number of pushes merged since the receiver started
    pub fn push_count(&self) -> u64 {
        *self.shared.push_count.borrow()
    }

    pub fn connected_agents(&self) -> usize {
        *self.shared.agent_count.borrow()
    }

    /// Wait until at least `count` pushes have been merged
    pub async fn wait_for_pushes(&self, count: u64, timeout: Duration) -> Result<()> {
        let mut rx = self.shared.push_count.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|pushes| *pushes >= count))
            .await
            .map_err(|_| TransportError::timeout("wait for pushes", timeout.as_millis() as u64))?
            .map_err(|_| TransportError::connection("Receiver stopped", None))?;
        Ok(())
    }

    /// Wait until at least `count` agents are connected
    pub async fn wait_for_agents(&self, count: usize, timeout: Duration) -> Result<()> {
        let mut rx = self.shared.agent_count.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|agents| *agents >= count))
            .await
            .map_err(|_| TransportError::timeout("wait for agents", timeout.as_millis() as u64))?
            .map_err(|_| TransportError::connection("Receiver stopped", None))?;
        Ok(())
    }

    /// Send CMD_DUMP to every connected agent; returns how many were asked
    ///
    /// Agents answer asynchronously; use [`wait_for_pushes`](Self::wait_for_pushes)
    /// to wait for the data.
    pub async fn request_dump(&self, dump: bool, reset: bool) -> usize {
        let agents: Vec<(u64, AgentWriter)> = self
            .shared
            .agents
            .lock()
            .iter()
            .map(|(id, writer)| (*id, writer.clone()))
            .collect();

        let mut requested = 0;
        for (id, writer) in agents {
            match writer.lock().await.send_dump_command(dump, reset).await {
                Ok(()) => requested += 1,
                Err(e) => warn!(agent = id, "Failed to request dump: {}", e),
            }
        }
        requested
    }

    /// Stop accepting agents and close every agent connection
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(task) = self.accept_task.take() else {
            return Ok(());
        };
        let _ = self.shutdown_tx.send(true);
        let _ = task.await;
        info!("Receiver on {} stopped", self.local_addr);
        Ok(())
    }
}

impl Drop for ExecutionDataReceiver {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut handlers = JoinSet::new();
    let mut next_id = 0u64;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    next_id += 1;
                    let id = next_id;
                    let shared = shared.clone();
                    handlers.spawn(async move {
                        if let Err(e) = serve_agent(stream, id, &shared).await {
                            warn!(agent = id, peer = %peer, "Agent connection failed: {}", e);
                        }
                        shared.remove_agent(id);
                    });
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
        }
    }

    // Agent connections are long-lived, so they are closed rather than drained
    handlers.shutdown().await;
    shared.agents.lock().clear();
    shared.agent_count.send_replace(0);
}

async fn serve_agent(stream: TcpStream, id: u64, shared: &Shared) -> Result<()> {
    let (mut reader, mut writer) = split_tcp(stream);
    writer.send_header().await?;
    reader.expect_header(HEADER_TIMEOUT).await?;

    let peer = reader.peer_addr();
    shared.add_agent(id, Arc::new(tokio::sync::Mutex::new(writer)));
    debug!(agent = id, peer = ?peer, "Agent connected");

    while let Some(set) = reader.read_until_ok().await? {
        let merged = shared.data.lock().merge_set(&set);
        match merged {
            Ok(()) => {
                shared.push_count.send_modify(|pushes| *pushes += 1);
                debug!(
                    agent = id,
                    sessions = set.sessions().len(),
                    classes = set.len(),
                    "Merged execution data"
                );
            }
            Err(e) => warn!(agent = id, "Rejected incompatible execution data: {}", e),
        }
    }

    debug!(agent = id, "Agent disconnected");
    Ok(())
}
