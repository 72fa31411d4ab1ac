//! # Class Identifiers
//!
//! A [`ClassId`] is the structural hash of one compiled form of a class. Two
//! versions of the same class name with different bytecode get different ids,
//! so execution data from old and new builds never mixes.
//!
//! The hash itself is computed in `codec::class_id`; this type only carries the
//! value and gives it a stable textual form (16 lower-case hex digits).

use std::fmt;
use std::str::FromStr;

/// Type-safe 64-bit class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClassId(u64);

impl ClassId {
    /// Wrap a raw hash value
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw hash value
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian byte representation used on the wire
    #[inline]
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Rebuild from the wire representation
    #[inline]
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl From<u64> for ClassId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<ClassId> for u64 {
    fn from(id: ClassId) -> Self {
        id.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::LowerHex for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl FromStr for ClassId {
    type Err = hex::FromHexError;

    /// Parse the 16-digit hex form produced by `Display`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_zero_padded_hex() {
        assert_eq!(ClassId::new(0x1F).to_string(), "000000000000001f");
        assert_eq!(
            ClassId::new(0xE3DCADD69B01ADD1).to_string(),
            "e3dcadd69b01add1"
        );
    }

    #[test]
    fn test_parse_display_form() {
        let id: ClassId = "e3dcadd69b01add1".parse().unwrap();
        assert_eq!(id.as_u64(), 0xE3DCADD69B01ADD1);

        let id: ClassId = "0x000000000000001f".parse().unwrap();
        assert_eq!(id, ClassId::new(0x1F));

        assert!("xyz".parse::<ClassId>().is_err());
        assert!("1f".parse::<ClassId>().is_err());
    }

    #[test]
    fn test_wire_bytes_are_big_endian() {
        let id = ClassId::new(0x0102030405060708);
        assert_eq!(id.to_be_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ClassId::from_be_bytes(id.to_be_bytes()), id);
    }
}
