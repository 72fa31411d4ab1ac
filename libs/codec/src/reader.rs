//! # Execution Data Reader
//!
//! Decodes a complete byte stream (a file, or everything a socket delivered
//! before closing). The first record must be a header; further headers may
//! follow when files were appended to. Decoding stops at the first bad
//! record, and a stream that ends inside a record is an error here because no
//! more bytes can arrive.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::{self, Record};
use crate::compact::CompactReader;
use tracing::debug;
use types::ExecutionDataSet;

/// Iterator over the records of a complete stream
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug)]
pub struct ExecutionDataReader<'a> {
    reader: CompactReader<'a>,
    seen_header: bool,
    failed: bool,
}

impl<'a> ExecutionDataReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: CompactReader::new(data),
            seen_header: false,
            failed: false,
        }
    }

    /// Bytes consumed by the records yielded so far
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    fn next_record(&mut self) -> ProtocolResult<Record> {
        let offset = self.reader.position();
        let record = record::read_record(&mut self.reader)?;
        if !self.seen_header {
            if !matches!(record, Record::Header { .. }) {
                return Err(ProtocolError::missing_header(record.block_type()));
            }
            self.seen_header = true;
        }
        debug!(offset, block_type = record.block_type(), "decoded record");
        Ok(record)
    }
}

impl Iterator for ExecutionDataReader<'_> {
    type Item = ProtocolResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let result = self.next_record();
        self.failed = result.is_err();
        Some(result)
    }
}

impl std::iter::FusedIterator for ExecutionDataReader<'_> {}

/// Decode every record of `data`
pub fn read_records(data: &[u8]) -> ProtocolResult<Vec<Record>> {
    ExecutionDataReader::new(data).collect()
}

/// Decode `data` into a data set
///
/// Sessions are kept in stream order, repeated class ids are merged by OR and
/// remote command blocks are ignored. An empty input yields an empty set.
pub fn read_data_set(data: &[u8]) -> ProtocolResult<ExecutionDataSet> {
    let mut set = ExecutionDataSet::new();
    read_into(data, &mut set)?;
    Ok(set)
}

/// Decode `data` and merge its contents into `set`
///
/// On error `set` may already contain the records decoded before the bad one.
pub fn read_into(data: &[u8], set: &mut ExecutionDataSet) -> ProtocolResult<()> {
    for record in ExecutionDataReader::new(data) {
        match record? {
            Record::SessionInfo(info) => set.add_session(info),
            Record::ExecutionData(data) => set.merge_in(data)?,
            Record::Header { .. } | Record::DumpCommand { .. } | Record::CommandOk => {}
        }
    }
    Ok(())
}
