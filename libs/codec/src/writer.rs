//! # Execution Data Writer
//!
//! Serializes sessions and class records into an in-memory buffer. The stream
//! header is emitted lazily before the first record, so a writer that never
//! sees any data produces no bytes at all; callers append the buffer to a
//! file or socket with [`ExecutionDataWriter::take`].
//!
//! ```text
//! Runtime/DataSet → [ExecutionDataWriter] → BytesMut → file / socket
//! ```

use crate::constants::FORMAT_VERSION;
use crate::error::ProtocolResult;
use crate::record::Record;
use bytes::{Bytes, BytesMut};
use types::{ExecutionData, ExecutionDataSet, SessionInfo};

/// Buffered writer for the execution data format
#[derive(Debug, Default)]
pub struct ExecutionDataWriter {
    buf: BytesMut,
    header_written: bool,
}

impl ExecutionDataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer that behaves as if the header had already been emitted
    ///
    /// Used when appending to an existing stream that already starts with one.
    pub fn continuing() -> Self {
        Self {
            buf: BytesMut::new(),
            header_written: true,
        }
    }

    fn ensure_header(&mut self) -> ProtocolResult<()> {
        if !self.header_written {
            self.header_written = true;
            Record::Header {
                version: FORMAT_VERSION,
            }
            .encode(&mut self.buf)?;
        }
        Ok(())
    }

    pub fn visit_session_info(&mut self, info: &SessionInfo) -> ProtocolResult<()> {
        self.ensure_header()?;
        Record::SessionInfo(info.clone()).encode(&mut self.buf)
    }

    /// Write one class record, whether or not any probe was executed
    pub fn visit_class_execution(&mut self, data: &ExecutionData) -> ProtocolResult<()> {
        self.ensure_header()?;
        Record::ExecutionData(data.clone()).encode(&mut self.buf)
    }

    /// Sessions first, then every class, in insertion order
    pub fn write_data_set(&mut self, set: &ExecutionDataSet) -> ProtocolResult<()> {
        for info in set.sessions() {
            self.visit_session_info(info)?;
        }
        for data in set {
            self.visit_class_execution(data)?;
        }
        Ok(())
    }

    /// Write an arbitrary record verbatim
    ///
    /// Header records are written as given and mark the header as emitted.
    pub fn write_record(&mut self, record: &Record) -> ProtocolResult<()> {
        if matches!(record, Record::Header { .. }) {
            self.header_written = true;
        } else {
            self.ensure_header()?;
        }
        record.encode(&mut self.buf)
    }

    pub fn write_dump_command(&mut self, dump: bool, reset: bool) -> ProtocolResult<()> {
        self.write_record(&Record::DumpCommand { dump, reset })
    }

    pub fn write_command_ok(&mut self) -> ProtocolResult<()> {
        self.write_record(&Record::CommandOk)
    }

    /// Force the header out even if no record follows
    pub fn write_header(&mut self) -> ProtocolResult<()> {
        self.ensure_header()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the buffered bytes, keeping the header state
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Encode a complete stream for `set`, header included
pub fn encode_data_set(set: &ExecutionDataSet) -> ProtocolResult<Bytes> {
    let mut writer = ExecutionDataWriter::new();
    writer.write_header()?;
    writer.write_data_set(set)?;
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::file_header;
    use types::ClassId;

    #[test]
    fn test_no_records_no_bytes() {
        let empty = ExecutionDataWriter::new();
        assert!(empty.is_empty());
        assert!(empty.into_bytes().is_empty());
    }

    #[test]
    fn test_class_without_hits_is_written() {
        let mut writer = ExecutionDataWriter::new();
        writer
            .visit_class_execution(&ExecutionData::with_probe_count(ClassId::new(1), "A", 4))
            .unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..5], &file_header());
        assert_eq!(bytes[5], 0x11);
        // Four cleared probes pack into a single zero byte
        assert_eq!(&bytes[bytes.len() - 2..], &[0x04, 0x00]);
    }

    #[test]
    fn test_header_written_once() {
        let mut writer = ExecutionDataWriter::new();
        writer.visit_session_info(&SessionInfo::new("s", 1, 2)).unwrap();
        writer.write_command_ok().unwrap();
        let bytes = writer.take();
        assert_eq!(&bytes[..5], &file_header());
        assert_eq!(bytes.iter().filter(|&&b| b == 0xC0).count(), 2);
        assert_eq!(bytes[bytes.len() - 1], 0x20);

        writer.write_command_ok().unwrap();
        assert_eq!(writer.take().to_vec(), vec![0x20]);
    }

    #[test]
    fn test_continuing_skips_header() {
        let mut writer = ExecutionDataWriter::continuing();
        writer.write_dump_command(true, true).unwrap();
        assert_eq!(writer.into_bytes().to_vec(), vec![0x40, 0x01, 0x01]);
    }

    #[test]
    fn test_encode_empty_set_is_header_only() {
        let bytes = encode_data_set(&ExecutionDataSet::new()).unwrap();
        assert_eq!(bytes.to_vec(), file_header().to_vec());
    }
}
