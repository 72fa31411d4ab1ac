//! # Record Framing
//!
//! One block type byte followed by the block body. [`decode_record`] is the
//! single entry point used by both the file reader and the socket readers: it
//! returns `Ok(None)` while the buffer holds only part of a record, so a
//! network reader can keep accumulating bytes, and a record cut off by a
//! disconnect is never partially applied.

use crate::compact::{self, CompactReader};
use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use bytes::BufMut;
use types::{ClassId, ExecutionData, SessionInfo};

/// One decoded block of an execution data stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Stream header; only the supported version decodes successfully
    Header { version: u16 },
    SessionInfo(SessionInfo),
    ExecutionData(ExecutionData),
    /// Remote request to dump and/or reset the runtime data
    DumpCommand { dump: bool, reset: bool },
    /// Remote confirmation that a command has been processed
    CommandOk,
}

impl Record {
    /// Block type byte of this record
    pub fn block_type(&self) -> u8 {
        match self {
            Self::Header { .. } => BLOCK_HEADER,
            Self::SessionInfo(_) => BLOCK_SESSION_INFO,
            Self::ExecutionData(_) => BLOCK_EXECUTION_DATA,
            Self::DumpCommand { .. } => BLOCK_CMD_DUMP,
            Self::CommandOk => BLOCK_CMD_OK,
        }
    }

    /// Append the encoded record to `buf`
    pub fn encode(&self, buf: &mut impl BufMut) -> ProtocolResult<()> {
        buf.put_u8(self.block_type());
        match self {
            Self::Header { version } => {
                buf.put_u16(MAGIC_NUMBER);
                buf.put_u16(*version);
            }
            Self::SessionInfo(info) => {
                compact::write_utf(buf, info.id())?;
                buf.put_i64(info.start_time());
                buf.put_i64(info.dump_time());
            }
            Self::ExecutionData(data) => {
                buf.put_u64(data.id().as_u64());
                compact::write_utf(buf, data.name())?;
                compact::write_boolean_array(buf, data.probes());
            }
            Self::DumpCommand { dump, reset } => {
                compact::write_boolean(buf, *dump);
                compact::write_boolean(buf, *reset);
            }
            Self::CommandOk => {}
        }
        Ok(())
    }
}

/// Decode the record at the start of `data`
///
/// Returns the record and the number of bytes it occupied, or `None` if
/// `data` does not yet contain a complete record.
pub fn decode_record(data: &[u8]) -> ProtocolResult<Option<(Record, usize)>> {
    if data.is_empty() {
        return Ok(None);
    }
    let mut reader = CompactReader::new(data);
    match read_record(&mut reader) {
        Ok(record) => Ok(Some((record, reader.position()))),
        Err(e) if e.is_truncation() => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) fn read_record(reader: &mut CompactReader<'_>) -> ProtocolResult<Record> {
    let offset = reader.position();
    let block_type = reader.read_u8()?;
    match block_type {
        BLOCK_HEADER => {
            let magic = reader.read_u16()?;
            if magic != MAGIC_NUMBER {
                return Err(ProtocolError::invalid_magic(MAGIC_NUMBER, magic, offset + 1));
            }
            let version = reader.read_u16()?;
            if version != FORMAT_VERSION {
                return Err(ProtocolError::UnsupportedVersion {
                    expected: FORMAT_VERSION,
                    actual: version,
                });
            }
            Ok(Record::Header { version })
        }
        BLOCK_SESSION_INFO => {
            let id = reader.read_utf()?;
            let start = reader.read_i64()?;
            let dump = reader.read_i64()?;
            Ok(Record::SessionInfo(SessionInfo::new(id, start, dump)))
        }
        BLOCK_EXECUTION_DATA => {
            let id = ClassId::new(reader.read_u64()?);
            let name = reader.read_utf()?;
            let probes = reader.read_boolean_array()?;
            Ok(Record::ExecutionData(ExecutionData::new(id, name, probes)))
        }
        BLOCK_CMD_DUMP => {
            let dump = reader.read_boolean()?;
            let reset = reader.read_boolean()?;
            Ok(Record::DumpCommand { dump, reset })
        }
        BLOCK_CMD_OK => Ok(Record::CommandOk),
        other => Err(ProtocolError::UnknownBlockType {
            block_type: other,
            offset,
        }),
    }
}
