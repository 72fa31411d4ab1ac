//! Framed record connections
//!
//! Execution data streams carry no length prefix: records are decoded as
//! bytes arrive, and a record cut off by a disconnect is dropped whole.
//! Reading and writing are separate halves so one task can wait for remote
//! commands while another pushes data.

use crate::{Result, TransportError};
use bytes::BytesMut;
use codec::{decode_record, ExecutionDataWriter, Record};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};
use types::ExecutionDataSet;

/// Largest amount of buffered bytes that may form a single record
pub const DEFAULT_MAX_RECORD_SIZE: usize = 16 * 1024 * 1024; // 16MB

const READ_CHUNK: usize = 64 * 1024; // 64KB

/// Reading half of a record stream
pub struct RecordReader<R> {
    inner: R,
    peer_addr: Option<SocketAddr>,
    buffer: BytesMut,
    max_record_size: usize,
    bytes_received: u64,
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    pub fn new(inner: R, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            inner,
            peer_addr,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            bytes_received: 0,
        }
    }

    pub fn with_max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    /// Next complete record, or `None` once the peer has closed the stream
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some((record, used)) = decode_record(&self.buffer)? {
                let _ = self.buffer.split_to(used);
                return Ok(Some(record));
            }

            if self.buffer.len() > self.max_record_size {
                return Err(TransportError::protocol(format!(
                    "Record size exceeds maximum {}",
                    self.max_record_size
                )));
            }

            self.buffer.reserve(READ_CHUNK);
            let read = self.inner.read_buf(&mut self.buffer).await.map_err(|e| {
                TransportError::connection_with_source("Failed to read record", self.peer_addr, e)
            })?;
            if read == 0 {
                if !self.buffer.is_empty() {
                    debug!(
                        peer = ?self.peer_addr,
                        discarded = self.buffer.len(),
                        "Stream closed inside a record, discarding partial record"
                    );
                    self.buffer.clear();
                }
                return Ok(None);
            }
            self.bytes_received += read as u64;
        }
    }

    /// Next record with a deadline
    pub async fn next_record_timeout(&mut self, timeout: Duration) -> Result<Option<Record>> {
        tokio::time::timeout(timeout, self.next_record())
            .await
            .map_err(|_| TransportError::timeout("read record", timeout.as_millis() as u64))?
    }

    /// Read the stream header; anything else is a protocol error
    pub async fn expect_header(&mut self, timeout: Duration) -> Result<()> {
        match self.next_record_timeout(timeout).await? {
            Some(Record::Header { .. }) => Ok(()),
            Some(other) => Err(TransportError::protocol(format!(
                "Expected header block, got block type {:#04x}",
                other.block_type()
            ))),
            None => Err(TransportError::connection(
                "Connection closed before header",
                self.peer_addr,
            )),
        }
    }

    /// Collect sessions and class data up to the next CMD_OK
    ///
    /// Returns `None` if the stream ends first; the partial data is dropped.
    pub async fn read_until_ok(&mut self) -> Result<Option<ExecutionDataSet>> {
        let mut set = ExecutionDataSet::new();
        loop {
            match self.next_record().await? {
                Some(Record::SessionInfo(info)) => set.add_session(info),
                Some(Record::ExecutionData(data)) => set.merge_in(data)?,
                Some(Record::CommandOk) => return Ok(Some(set)),
                Some(Record::Header { .. }) => {}
                Some(Record::DumpCommand { .. }) => {
                    warn!(peer = ?self.peer_addr, "Unexpected dump command while reading data");
                }
                None => return Ok(None),
            }
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

/// Writing half of a record stream
///
/// The stream header goes out once, ahead of the first record.
pub struct RecordWriter<W> {
    inner: W,
    peer_addr: Option<SocketAddr>,
    writer: ExecutionDataWriter,
    bytes_sent: u64,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    pub fn new(inner: W, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            inner,
            peer_addr,
            writer: ExecutionDataWriter::new(),
            bytes_sent: 0,
        }
    }

    async fn flush_records(&mut self) -> Result<()> {
        let bytes = self.writer.take();
        self.inner.write_all(&bytes).await.map_err(|e| {
            TransportError::connection_with_source("Failed to write records", self.peer_addr, e)
        })?;
        self.inner.flush().await.map_err(|e| {
            TransportError::connection_with_source("Failed to flush stream", self.peer_addr, e)
        })?;
        self.bytes_sent += bytes.len() as u64;
        debug!(
            peer = ?self.peer_addr,
            bytes = bytes.len(),
            total_sent = self.bytes_sent,
            "Sent records"
        );
        Ok(())
    }

    pub async fn send_header(&mut self) -> Result<()> {
        self.writer.write_header()?;
        self.flush_records().await
    }

    /// Send a data set followed by CMD_OK
    pub async fn send_data_set(&mut self, set: &ExecutionDataSet) -> Result<()> {
        self.writer.write_data_set(set)?;
        self.writer.write_command_ok()?;
        self.flush_records().await
    }

    pub async fn send_dump_command(&mut self, dump: bool, reset: bool) -> Result<()> {
        self.writer.write_dump_command(dump, reset)?;
        self.flush_records().await
    }

    pub async fn send_command_ok(&mut self) -> Result<()> {
        self.writer.write_command_ok()?;
        self.flush_records().await
    }

    /// Close the write direction
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(|e| {
            TransportError::connection_with_source("Failed to shut down stream", self.peer_addr, e)
        })
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

/// Split a TCP stream into framed halves
pub fn split_tcp(stream: TcpStream) -> (RecordReader<OwnedReadHalf>, RecordWriter<OwnedWriteHalf>) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }
    let peer_addr = stream.peer_addr().ok();
    let (read, write) = stream.into_split();
    (
        RecordReader::new(read, peer_addr),
        RecordWriter::new(write, peer_addr),
    )
}

/// Connect with a per-attempt timeout
pub async fn connect(address: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    tokio::time::timeout(timeout, TcpStream::connect((address, port)))
        .await
        .map_err(|_| TransportError::timeout("TCP connect", timeout.as_millis() as u64))?
        .map_err(|e| {
            TransportError::connection_with_source(
                format!("Failed to connect to {address}:{port}"),
                None,
                e,
            )
        })
}

/// Connection retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_retry_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_retry_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            ..Default::default()
        }
    }

    /// Connect, retrying failed attempts with growing delays
    pub async fn connect(&self, address: &str, port: u16) -> Result<TcpStream> {
        let mut delay = self.retry_delay;

        for attempt in 0..=self.max_retries {
            debug!(
                "Connection attempt {}/{} to {}:{}",
                attempt + 1,
                self.max_retries + 1,
                address,
                port
            );
            match connect(address, port, self.connect_timeout).await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < self.max_retries => {
                    warn!(
                        "Connection attempt {} failed: {}, retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;

                    // Exponential backoff
                    let next_delay_secs = delay.as_secs_f64() * self.backoff_multiplier;
                    delay = Duration::from_secs_f64(
                        next_delay_secs.min(self.max_retry_delay.as_secs_f64()),
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(TransportError::connection("Max retries exceeded", None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::file_header;
    use tokio::io::duplex;
    use types::{ClassId, ExecutionData, SessionInfo};

    #[tokio::test]
    async fn test_records_across_small_writes() {
        let (client, mut server) = duplex(8);
        let mut reader = RecordReader::new(client, None);

        let mut set = ExecutionDataSet::new();
        set.add_session(SessionInfo::new("s", 1, 2));
        set.merge_in(ExecutionData::new(ClassId::new(3), "C", vec![true, false]))
            .unwrap();
        let mut bytes = codec::encode_data_set(&set).unwrap().to_vec();
        bytes.push(codec::BLOCK_CMD_OK);

        let writer = tokio::spawn(async move {
            for chunk in bytes.chunks(3) {
                server.write_all(chunk).await.unwrap();
            }
        });

        reader.expect_header(Duration::from_secs(5)).await.unwrap();
        let received = reader.read_until_ok().await.unwrap().unwrap();
        assert_eq!(received, set);
        writer.await.unwrap();
        assert_eq!(reader.next_record().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_record_dropped_on_close() {
        let (client, mut server) = duplex(64);
        let mut reader = RecordReader::new(client, None);

        let mut bytes = file_header().to_vec();
        bytes.extend_from_slice(&[0x10, 0x00, 0x08, b'p']);
        server.write_all(&bytes).await.unwrap();
        drop(server);

        assert!(matches!(
            reader.next_record().await.unwrap(),
            Some(Record::Header { .. })
        ));
        assert_eq!(reader.next_record().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_size_limit() {
        let (client, mut server) = duplex(1024);
        let mut reader = RecordReader::new(client, None).with_max_record_size(16);

        // Session record announcing a 200-byte id that never completes
        let mut bytes = vec![0x10, 0x00, 0xC8];
        bytes.extend_from_slice(&[b'x'; 40]);
        server.write_all(&bytes).await.unwrap();

        let err = reader.next_record().await.unwrap_err();
        assert_eq!(err.category(), "protocol");
    }

    #[tokio::test]
    async fn test_writer_sends_header_once() {
        let (client, server) = duplex(1024);
        let mut writer = RecordWriter::new(client, None);
        let mut reader = RecordReader::new(server, None);

        writer.send_header().await.unwrap();
        writer.send_dump_command(true, false).await.unwrap();
        writer.send_command_ok().await.unwrap();
        assert_eq!(writer.bytes_sent(), 5 + 3 + 1);

        reader.expect_header(Duration::from_secs(1)).await.unwrap();
        assert_eq!(
            reader.next_record().await.unwrap(),
            Some(Record::DumpCommand {
                dump: true,
                reset: false
            })
        );
        assert_eq!(reader.next_record().await.unwrap(), Some(Record::CommandOk));
    }

    #[tokio::test]
    async fn test_retry_policy_gives_up() {
        // Bind and drop to get a port that refuses connections
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let err = policy.connect("127.0.0.1", port).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
