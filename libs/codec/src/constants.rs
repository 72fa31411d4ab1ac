//! # Format Constants
//!
//! Block identifiers and header values of the execution data format. These
//! are pinned to the reference format so files and sockets interoperate with
//! existing deployments: every stream starts with `01 C0 C0 10 07`.
//!
//! ```text
//! HEADER          0x01  magic:u16  version:u16
//! SESSION_INFO    0x10  id:utf     start:i64  dump:i64
//! EXECUTION_DATA  0x11  class_id:u64  name:utf  probes:bool[]
//! CMD_OK          0x20
//! CMD_DUMP        0x40  dump:bool  reset:bool
//! ```

/// Magic number in the header for format identification
pub const MAGIC_NUMBER: u16 = 0xC0C0;

/// Format version, incremented for each incompatible change
pub const FORMAT_VERSION: u16 = 0x1007;

/// Block identifier for the stream header
pub const BLOCK_HEADER: u8 = 0x01;

/// Block identifier for session information
pub const BLOCK_SESSION_INFO: u8 = 0x10;

/// Block identifier for the execution data of a single class
pub const BLOCK_EXECUTION_DATA: u8 = 0x11;

/// Block identifier confirming a processed command
pub const BLOCK_CMD_OK: u8 = 0x20;

/// Block identifier for a dump (and/or reset) request
pub const BLOCK_CMD_DUMP: u8 = 0x40;

/// Encoded size of a header block
pub const HEADER_SIZE: usize = 5;

/// Longest string body the 2-byte length prefix can describe
pub const MAX_UTF_LENGTH: usize = u16::MAX as usize;

/// The first bytes of every valid execution data stream
pub const fn file_header() -> [u8; HEADER_SIZE] {
    let magic = MAGIC_NUMBER.to_be_bytes();
    let version = FORMAT_VERSION.to_be_bytes();
    [BLOCK_HEADER, magic[0], magic[1], version[0], version[1]]
}

/// Human readable block name for diagnostics
pub fn block_name(block_type: u8) -> &'static str {
    match block_type {
        BLOCK_HEADER => "HEADER",
        BLOCK_SESSION_INFO => "SESSION_INFO",
        BLOCK_EXECUTION_DATA => "EXECUTION_DATA",
        BLOCK_CMD_OK => "CMD_OK",
        BLOCK_CMD_DUMP => "CMD_DUMP",
        _ => "UNKNOWN",
    }
}
