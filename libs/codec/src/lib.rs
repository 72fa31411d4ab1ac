//! # covrt Execution Data Codec
//!
//! ## Purpose
//!
//! The "Rules" layer of covrt: everything needed to turn execution data into
//! bytes and back, shared by the file output, the TCP transports and the
//! offline tools.
//! - Compact primitives (var ints, packed boolean arrays, modified UTF-8)
//! - Record framing and the incremental `decode_record` entry point
//! - Buffered writer with lazy stream header
//! - Stream reader producing records or a merged data set
//! - Class identity hashing (CRC-64)
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → network/
//!     ↑           ↓          ↓
//! Pure Data   Encoding    Files and
//! Structures  Framing     Sockets
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Transport logic (belongs in network/)
//! - Data model definitions and merge rules (belong in libs/types)
//! - Live probe storage (belongs in libs/runtime)

pub mod class_id;
pub mod compact;
pub mod constants;
pub mod error;
pub mod reader;
pub mod record;
pub mod writer;

pub use class_id::{checksum, class_id, Crc64};
pub use compact::CompactReader;
pub use constants::*;
pub use error::{ProtocolError, ProtocolResult};
pub use reader::{read_data_set, read_into, read_records, ExecutionDataReader};
pub use record::{decode_record, Record};
pub use writer::{encode_data_set, ExecutionDataWriter};
