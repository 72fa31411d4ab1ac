//! # Class Identity
//!
//! 64-bit CRC over the raw class bytes, reversed ISO 3309 polynomial. The
//! lookup table is computed at compile time; hashing is a pure function and
//! safe to call from any number of threads.
//!
//! Class files with major version 53 written through the early-adopter shim
//! are hashed as if they carried major version 52, so the same logical
//! bytecode gets the same id no matter which tool produced it.

use types::ClassId;

/// Reversed polynomial x^64 + x^4 + x^3 + x + 1
const POLY64REV: u64 = 0xD800_0000_0000_0000;

/// Offset of the low byte of the class-file major version
const MAJOR_VERSION_OFFSET: usize = 7;

/// Major version emitted by the compatibility shim
const SHIM_MAJOR_VERSION: u8 = 0x35;

/// Major version the shim stands in for
const CANONICAL_MAJOR_VERSION: u8 = 0x34;

static LOOKUP_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut v = i as u64;
        let mut j = 0;
        while j < 8 {
            if v & 1 == 1 {
                v = (v >> 1) ^ POLY64REV;
            } else {
                v >>= 1;
            }
            j += 1;
        }
        table[i] = v;
        i += 1;
    }
    table
}

#[inline]
fn update_byte(sum: u64, byte: u8) -> u64 {
    let index = ((u64::from(byte) ^ sum) & 0xFF) as usize;
    (sum >> 8) ^ LOOKUP_TABLE[index]
}

fn update(sum: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(sum, |acc, &b| update_byte(acc, b))
}

/// Plain CRC-64 checksum of `bytes`
pub fn checksum(bytes: &[u8]) -> u64 {
    update(0, bytes)
}

/// Structural identifier for the given class bytes
pub fn class_id(bytes: &[u8]) -> ClassId {
    let shimmed = bytes.len() > MAJOR_VERSION_OFFSET
        && bytes[MAJOR_VERSION_OFFSET - 1] == 0x00
        && bytes[MAJOR_VERSION_OFFSET] == SHIM_MAJOR_VERSION;

    let sum = if shimmed {
        let sum = update(0, &bytes[..MAJOR_VERSION_OFFSET]);
        let sum = update_byte(sum, CANONICAL_MAJOR_VERSION);
        update(sum, &bytes[MAJOR_VERSION_OFFSET + 1..])
    } else {
        update(0, bytes)
    };
    ClassId::new(sum)
}

/// Streaming form for class bytes that arrive in pieces
///
/// Applies no version substitution; use [`class_id`] for complete class files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc64 {
    sum: u64,
}

impl Crc64 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.sum = update(self.sum, bytes);
    }

    pub fn finalize(self) -> u64 {
        self.sum
    }

    pub fn reset(&mut self) {
        self.sum = 0;
    }
}
