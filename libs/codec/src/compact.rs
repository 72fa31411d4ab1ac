//! # Compact Data Primitives
//!
//! Encoding rules shared by every record:
//!
//! - **var int**: 7 payload bits per byte, high bit = continuation, least
//!   significant group first. Negative values are written as their 32-bit
//!   pattern (always 5 bytes).
//! - **boolean array**: var int length, then `ceil(len / 8)` bytes; probe `i`
//!   lives in byte `i / 8` at bit `i % 8`, least significant bit first.
//! - **utf**: 2-byte big-endian length, then modified UTF-8 (NUL as `C0 80`,
//!   supplementary characters as two 3-byte surrogates).
//! - **long / char**: big-endian fixed width.
//!
//! Writers append to any [`BufMut`]. Reading goes through [`CompactReader`],
//! a cursor over a byte slice that reports [`ProtocolError::Truncated`] when the
//! slice ends early so incremental decoders can wait for more input.

use crate::constants::MAX_UTF_LENGTH;
use crate::error::{ProtocolError, ProtocolResult};
use bytes::BufMut;

/// Append a variable-length int
pub fn write_var_int(buf: &mut impl BufMut, value: i32) {
    let mut v = value as u32;
    while v & !0x7F != 0 {
        buf.put_u8(0x80 | (v & 0x7F) as u8);
        v >>= 7;
    }
    buf.put_u8(v as u8);
}

/// Append a packed boolean array
pub fn write_boolean_array(buf: &mut impl BufMut, values: &[bool]) {
    write_var_int(buf, values.len() as i32);
    for chunk in values.chunks(8) {
        let mut byte = 0u8;
        for (bit, &set) in chunk.iter().enumerate() {
            if set {
                byte |= 1 << bit;
            }
        }
        buf.put_u8(byte);
    }
}

pub fn write_boolean(buf: &mut impl BufMut, value: bool) {
    buf.put_u8(u8::from(value));
}

/// Append a length-prefixed modified UTF-8 string
pub fn write_utf(buf: &mut impl BufMut, value: &str) -> ProtocolResult<()> {
    let length = utf_length(value);
    if length > MAX_UTF_LENGTH {
        return Err(ProtocolError::StringTooLong {
            length,
            max: MAX_UTF_LENGTH,
        });
    }
    buf.put_u16(length as u16);
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => buf.put_u8(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buf.put_u8(0xC0 | ((unit >> 6) & 0x1F) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                buf.put_u8(0xE0 | ((unit >> 12) & 0x0F) as u8);
                buf.put_u8(0x80 | ((unit >> 6) & 0x3F) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    Ok(())
}

/// Encoded size of a string body, without the length prefix
fn utf_length(value: &str) -> usize {
    value
        .encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Cursor over an encoded byte slice
#[derive(Debug, Clone)]
pub struct CompactReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CompactReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize, context: &str) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::truncated(
                n - self.remaining(),
                self.pos,
                context,
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.take(1, "byte")?[0])
    }

    pub fn read_boolean(&mut self) -> ProtocolResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        let bytes = self.take(2, "char")?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u64(&mut self) -> ProtocolResult<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8, "long")?);
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn read_i64(&mut self) -> ProtocolResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_var_int(&mut self) -> ProtocolResult<i32> {
        let start = self.pos;
        let mut value: u32 = 0;
        for group in 0..5 {
            let byte = self.take(1, "var int")?[0];
            value |= u32::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(ProtocolError::MalformedVarInt { offset: start })
    }

    pub fn read_boolean_array(&mut self) -> ProtocolResult<Vec<bool>> {
        let start = self.pos;
        let length = self.read_var_int()?;
        if length < 0 {
            return Err(ProtocolError::InvalidLength {
                length,
                offset: start,
            });
        }
        let length = length as usize;
        let packed = self.take(length.div_ceil(8), "boolean array")?;
        Ok((0..length)
            .map(|i| packed[i / 8] & (1 << (i % 8)) != 0)
            .collect())
    }

    pub fn read_utf(&mut self) -> ProtocolResult<String> {
        let start = self.pos;
        let length = self.read_u16()? as usize;
        let bytes = self.take(length, "utf")?;
        decode_modified_utf8(bytes).map_err(|reason| ProtocolError::malformed_string(start, reason))
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> Result<String, String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        match b0 >> 4 {
            0x0..=0x7 => {
                units.push(u16::from(b0));
                i += 1;
            }
            0xC | 0xD => {
                let b1 = continuation(bytes, i + 1)?;
                units.push((u16::from(b0 & 0x1F) << 6) | u16::from(b1 & 0x3F));
                i += 2;
            }
            0xE => {
                let b1 = continuation(bytes, i + 1)?;
                let b2 = continuation(bytes, i + 2)?;
                units.push(
                    (u16::from(b0 & 0x0F) << 12)
                        | (u16::from(b1 & 0x3F) << 6)
                        | u16::from(b2 & 0x3F),
                );
                i += 3;
            }
            _ => return Err(format!("invalid lead byte {b0:#04x} at {i}")),
        }
    }
    String::from_utf16(&units).map_err(|e| e.to_string())
}

fn continuation(bytes: &[u8], at: usize) -> Result<u8, String> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(b),
        Some(&b) => Err(format!("invalid continuation byte {b:#04x} at {at}")),
        None => Err("partial character at end of input".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn var_int_bytes(value: i32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        write_var_int(&mut buf, value);
        buf.to_vec()
    }

    #[test]
    fn test_var_int_round_trip() {
        for value in [0, 0x7F, 0x80, 0x100, 0x12345678, -1, i32::MIN, i32::MAX] {
            let bytes = var_int_bytes(value);
            let mut reader = CompactReader::new(&bytes);
            assert_eq!(reader.read_var_int().unwrap(), value, "value {value:#x}");
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_var_int_encoding() {
        assert_eq!(var_int_bytes(0), vec![0x00]);
        assert_eq!(var_int_bytes(0x7F), vec![0x7F]);
        assert_eq!(var_int_bytes(0x80), vec![0x80, 0x01]);
        assert_eq!(var_int_bytes(0x100), vec![0x80, 0x02]);
        assert_eq!(var_int_bytes(-1), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_var_int_too_long() {
        let mut reader = CompactReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert_eq!(
            reader.read_var_int(),
            Err(ProtocolError::MalformedVarInt { offset: 0 })
        );
    }

    #[test]
    fn test_boolean_array_round_trip() {
        for length in [0usize, 3, 8, 9, 15, 16, 17, 100] {
            let values: Vec<bool> = (0..length).map(|i| i % 3 == 0).collect();
            let mut buf = BytesMut::new();
            write_boolean_array(&mut buf, &values);
            assert_eq!(buf.len(), 1 + length.div_ceil(8));

            let mut reader = CompactReader::new(&buf);
            assert_eq!(reader.read_boolean_array().unwrap(), values);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_boolean_array_bit_layout() {
        let mut values = vec![false; 9];
        values[0] = true;
        values[3] = true;
        values[8] = true;
        let mut buf = BytesMut::new();
        write_boolean_array(&mut buf, &values);
        assert_eq!(buf.to_vec(), vec![0x09, 0b0000_1001, 0b0000_0001]);
    }

    #[test]
    fn test_truncated_boolean_array() {
        let mut reader = CompactReader::new(&[0x09, 0xFF]);
        let err = reader.read_boolean_array().unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_negative_array_length() {
        let bytes = var_int_bytes(-5);
        let mut reader = CompactReader::new(&bytes);
        assert!(matches!(
            reader.read_boolean_array(),
            Err(ProtocolError::InvalidLength { length: -5, .. })
        ));
    }

    #[test]
    fn test_utf_ascii() {
        let mut buf = BytesMut::new();
        write_utf(&mut buf, "com/example/Foo").unwrap();
        assert_eq!(&buf[..2], &[0x00, 15]);
        assert_eq!(&buf[2..], b"com/example/Foo");
    }

    #[test]
    fn test_utf_modified_encoding() {
        let mut buf = BytesMut::new();
        write_utf(&mut buf, "a\0b").unwrap();
        assert_eq!(buf.to_vec(), vec![0x00, 0x04, b'a', 0xC0, 0x80, b'b']);

        // U+1F600 becomes a surrogate pair, three bytes each
        let mut buf = BytesMut::new();
        write_utf(&mut buf, "\u{1F600}").unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x06]);

        for text in ["", "plain", "Grüße/Класс", "a\0b", "emoji \u{1F600} end"] {
            let mut buf = BytesMut::new();
            write_utf(&mut buf, text).unwrap();
            let mut reader = CompactReader::new(&buf);
            assert_eq!(reader.read_utf().unwrap(), text);
        }
    }

    #[test]
    fn test_utf_too_long() {
        let long = "x".repeat(MAX_UTF_LENGTH + 1);
        let mut buf = BytesMut::new();
        assert!(matches!(
            write_utf(&mut buf, &long),
            Err(ProtocolError::StringTooLong { .. })
        ));
    }

    #[test]
    fn test_malformed_utf() {
        let mut reader = CompactReader::new(&[0x00, 0x02, 0xC3, 0x28]);
        assert!(matches!(
            reader.read_utf(),
            Err(ProtocolError::MalformedString { offset: 0, .. })
        ));
    }

    #[test]
    fn test_fixed_width_values() {
        let data = [0x01, 0x02, 0x00, 0, 0, 0, 0, 0, 0, 0x01, 0x00];
        let mut reader = CompactReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_i64().unwrap(), 1);
        assert_eq!(reader.position(), 10);
        assert!(!reader.read_boolean().unwrap());
        assert!(reader.read_u8().unwrap_err().is_truncation());
    }
}
