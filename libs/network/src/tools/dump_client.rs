//! Remote dump requests against a TCP server agent

use crate::connection::{split_tcp, RetryPolicy};
use crate::{Result, TransportError};
use std::time::Duration;
use tracing::{debug, info};
use types::ExecutionDataSet;

/// Requests execution data from an agent running in tcpserver mode
#[derive(Debug, Clone)]
pub struct DumpClient {
    dump: bool,
    reset: bool,
    retry_count: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl Default for DumpClient {
    fn default() -> Self {
        Self {
            dump: true,
            reset: false,
            retry_count: 0,
            retry_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
        }
    }
}

impl DumpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the agent should send its execution data
    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    /// Whether the agent should reset its probes afterwards
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    /// Upper bound for waiting on the agent's answer
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request a dump from `address:port` and return what the agent sent
    ///
    /// With dump disabled the returned set is empty.
    pub async fn dump(&self, address: &str, port: u16) -> Result<ExecutionDataSet> {
        let policy = RetryPolicy {
            max_retries: self.retry_count,
            retry_delay: self.retry_delay,
            // Fixed delay between attempts
            backoff_multiplier: 1.0,
            ..Default::default()
        };
        let stream = policy.connect(address, port).await?;
        let (mut reader, mut writer) = split_tcp(stream);
        info!("Connected to {}:{}", address, port);

        writer.send_dump_command(self.dump, self.reset).await?;
        reader.expect_header(self.timeout).await?;

        let set = tokio::time::timeout(self.timeout, reader.read_until_ok())
            .await
            .map_err(|_| TransportError::timeout("dump", self.timeout.as_millis() as u64))??
            .ok_or_else(|| {
                TransportError::connection("Socket closed unexpectedly", reader.peer_addr())
            })?;

        debug!(
            sessions = set.sessions().len(),
            classes = set.len(),
            bytes = reader.bytes_received(),
            "Received execution data"
        );
        let _ = writer.shutdown().await;
        Ok(set)
    }
}
