//! Format errors for execution data decoding
//!
//! Each variant carries the byte offset of the offending record so a corrupt
//! file can be located. Decoding stops at the first error; there is no
//! partial-record recovery.

use crate::constants::block_name;
use thiserror::Error;
use types::DataError;

/// Errors raised while encoding or decoding execution data streams
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// The buffer ends inside a record
    ///
    /// Streaming readers treat this as "wait for more bytes"; at end of
    /// stream it means the record is discarded wholesale.
    #[error("Truncated record: need {need} more bytes at offset {offset} (context: {context})")]
    Truncated {
        need: usize,
        offset: usize,
        context: String,
    },

    /// The stream does not start with a header block
    #[error("Invalid execution data stream: expected header block, got {block_type:#04x} ({block})")]
    MissingHeader { block_type: u8, block: &'static str },

    /// Header magic number validation failed
    #[error("Invalid magic number: expected {expected:#06x}, got {actual:#06x} (offset: {offset})")]
    InvalidMagic {
        expected: u16,
        actual: u16,
        offset: usize,
    },

    /// Data written by an incompatible format version
    #[error("Incompatible format version {actual:#06x}: supported version is {expected:#06x}")]
    UnsupportedVersion { expected: u16, actual: u16 },

    /// Block type byte is not part of the format
    #[error("Unknown block type {block_type:#04x} at offset {offset}")]
    UnknownBlockType { block_type: u8, offset: usize },

    /// A variable-length integer has more than five groups
    #[error("Malformed var int at offset {offset}: more than 5 bytes")]
    MalformedVarInt { offset: usize },

    /// Negative length prefix
    #[error("Invalid array length {length} at offset {offset}")]
    InvalidLength { length: i32, offset: usize },

    /// String bytes are not valid modified UTF-8
    #[error("Malformed string at offset {offset}: {reason}")]
    MalformedString { offset: usize, reason: String },

    /// String does not fit the 2-byte length prefix
    #[error("String too long: {length} encoded bytes exceeds {max}")]
    StringTooLong { length: usize, max: usize },

    /// Decoded records disagree structurally (e.g. probe counts per class id)
    #[error("Incompatible execution data: {0}")]
    IncompatibleData(#[from] DataError),
}

/// Result type for codec operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

impl ProtocolError {
    pub fn truncated(need: usize, offset: usize, context: impl Into<String>) -> Self {
        Self::Truncated {
            need,
            offset,
            context: context.into(),
        }
    }

    pub fn missing_header(block_type: u8) -> Self {
        Self::MissingHeader {
            block_type,
            block: block_name(block_type),
        }
    }

    pub fn invalid_magic(expected: u16, actual: u16, offset: usize) -> Self {
        Self::InvalidMagic {
            expected,
            actual,
            offset,
        }
    }

    pub fn malformed_string(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedString {
            offset,
            reason: reason.into(),
        }
    }

    /// True if more input could complete the record
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting() {
        let err = ProtocolError::invalid_magic(0xC0C0, 0x1234, 1);
        assert_eq!(
            err.to_string(),
            "Invalid magic number: expected 0xc0c0, got 0x1234 (offset: 1)"
        );

        let err = ProtocolError::missing_header(0x11);
        assert!(err.to_string().contains("EXECUTION_DATA"));

        assert!(ProtocolError::truncated(3, 0, "var int").is_truncation());
        assert!(!ProtocolError::missing_header(0).is_truncation());
    }
}
