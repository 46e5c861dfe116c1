//! Record model
//!
//! A record is an opaque payload tagged with a type code, a version and
//! a flag bitset. Records read from a file hold a slice of the reader's
//! buffer arena, so cloning one never copies the payload.

use crate::header::Fields;
use bytes::Bytes;
use std::fmt;
use std::ops::BitOr;

/// Record flag bitset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RecordFlags(u16);

impl RecordFlags {
    /// No flags set
    pub const NONE: Self = Self(0);

    /// Payload is (or should be) stored compressed
    pub const COMPRESSED: Self = Self(1);

    /// Build from raw bits
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check if every bit of `other` is set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for RecordFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for RecordFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// A framed record
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    type_code: u32,
    version: u32,
    flags: RecordFlags,
    data: Bytes,
}

impl Record {
    /// Create an untyped record holding `data`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            type_code: 0,
            version: 0,
            flags: RecordFlags::NONE,
            data: data.into(),
        }
    }

    /// Create a record with a type code and version
    pub fn typed(type_code: u32, version: u32, data: impl Into<Bytes>) -> Self {
        Self {
            type_code,
            version,
            flags: RecordFlags::NONE,
            data: data.into(),
        }
    }

    /// Replace the flag bitset
    #[must_use]
    pub fn with_flags(mut self, flags: RecordFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Request compression when this record is written
    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.flags.insert(RecordFlags::COMPRESSED);
        self
    }

    /// Rebuild a record from decoded header fields and its logical payload
    pub(crate) fn from_fields(fields: &Fields, data: Bytes) -> Self {
        Self {
            type_code: fields.type_code,
            version: fields.version,
            flags: fields.flags,
            data,
        }
    }

    #[must_use]
    pub const fn type_code(&self) -> u32 {
        self.type_code
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub const fn flags(&self) -> RecordFlags {
        self.flags
    }

    /// Payload bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload as a shared buffer
    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Logical payload length
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if compression is requested (or was used on disk)
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.flags.contains(RecordFlags::COMPRESSED)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record(type={:#x}, ver={}, flags={}, len={})",
            self.type_code,
            self.version,
            self.flags,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = RecordFlags::NONE;
        assert!(!flags.contains(RecordFlags::COMPRESSED));

        flags.insert(RecordFlags::COMPRESSED | RecordFlags::from_bits(0x8));
        assert!(flags.contains(RecordFlags::COMPRESSED));
        assert_eq!(flags.bits(), 0x9);

        flags.remove(RecordFlags::COMPRESSED);
        assert_eq!(flags.bits(), 0x8);
    }

    #[test]
    fn test_record_display() {
        let record = Record::typed(0x42, 3, &b"hello"[..]).compressed();
        assert_eq!(
            record.to_string(),
            "Record(type=0x42, ver=3, flags=0x0001, len=5)"
        );
        assert!(record.is_compressed());
        assert_eq!(record.len(), 5);
    }
}
