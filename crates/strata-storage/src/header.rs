//! Record header formats
//!
//! A [`HeaderSpec`] converts between [`Fields`] and a fixed-size on-disk
//! header. Readers and writers hold an `Arc<dyn HeaderSpec>`, so files
//! using different layouts can be processed by the same process.
//!
//! Standard layout (default):
//! ```text
//! +-------+-------+----------+---------+--------+
//! | Magic | Flags | TypeCode | Version | Length |
//! | 2B    | 2B    | 4B       | 4B      | 8B     |
//! +-------+-------+----------+---------+--------+
//! ```
//!
//! Compact layout:
//! ```text
//! +--------+-------+----------+
//! | Length | Flags | TypeCode |
//! | 4B     | 2B    | 2B       |
//! +--------+-------+----------+
//! ```
//!
//! All integers are little-endian.

use crate::record::{Record, RecordFlags};
use std::fmt;
use std::sync::{Arc, LazyLock};
use strata_common::{Error, Result};

/// Standard header magic, "RS" on disk
const STANDARD_MAGIC: u16 = 0x5352;

/// Standard header size
pub const STANDARD_HEADER_SIZE: usize = 20;

/// Compact header size
pub const COMPACT_HEADER_SIZE: usize = 8;

static DEFAULT_SPEC: LazyLock<Arc<dyn HeaderSpec>> =
    LazyLock::new(|| Arc::new(StandardHeader) as Arc<dyn HeaderSpec>);

/// Process-wide default header format
#[must_use]
pub fn default_header_spec() -> Arc<dyn HeaderSpec> {
    Arc::clone(&DEFAULT_SPEC)
}

/// Header payload
///
/// `length` is always the number of payload bytes stored on disk after
/// the header, which is the compressed size for compressed frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    pub length: u64,
    pub flags: RecordFlags,
    pub type_code: u32,
    pub version: u32,
}

impl Fields {
    /// Build the fields for a record as it stands, before compression
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            length: record.len() as u64,
            flags: record.flags(),
            type_code: record.type_code(),
            version: record.version(),
        }
    }

    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.flags.contains(RecordFlags::COMPRESSED)
    }
}

/// A fixed-size header layout
pub trait HeaderSpec: Send + Sync + fmt::Debug {
    /// Format name for diagnostics
    fn name(&self) -> &'static str;

    /// Exact encoded size of every header
    fn header_size(&self) -> usize;

    /// Encode `fields` into the first `header_size()` bytes of `buf`
    fn serialize(&self, fields: &Fields, buf: &mut [u8]) -> Result<()>;

    /// Decode the first `header_size()` bytes of `buf`
    fn deserialize(&self, buf: &[u8]) -> Result<Fields>;
}

fn check_len(spec: &dyn HeaderSpec, len: usize) -> Result<()> {
    if len < spec.header_size() {
        return Err(Error::invalid_header(format!(
            "{} header needs {} bytes, buffer has {}",
            spec.name(),
            spec.header_size(),
            len
        )));
    }
    Ok(())
}

/// The default 20-byte header
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardHeader;

impl HeaderSpec for StandardHeader {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn header_size(&self) -> usize {
        STANDARD_HEADER_SIZE
    }

    fn serialize(&self, fields: &Fields, buf: &mut [u8]) -> Result<()> {
        check_len(self, buf.len())?;

        buf[0..2].copy_from_slice(&STANDARD_MAGIC.to_le_bytes());
        buf[2..4].copy_from_slice(&fields.flags.bits().to_le_bytes());
        buf[4..8].copy_from_slice(&fields.type_code.to_le_bytes());
        buf[8..12].copy_from_slice(&fields.version.to_le_bytes());
        buf[12..20].copy_from_slice(&fields.length.to_le_bytes());
        Ok(())
    }

    fn deserialize(&self, buf: &[u8]) -> Result<Fields> {
        check_len(self, buf.len())?;

        let magic = u16::from_le_bytes([buf[0], buf[1]]);
        if magic != STANDARD_MAGIC {
            return Err(Error::invalid_header(format!(
                "bad magic {magic:#06x}, expected {STANDARD_MAGIC:#06x}"
            )));
        }

        let mut word = [0u8; 4];
        let mut long = [0u8; 8];

        let flags = RecordFlags::from_bits(u16::from_le_bytes([buf[2], buf[3]]));
        word.copy_from_slice(&buf[4..8]);
        let type_code = u32::from_le_bytes(word);
        word.copy_from_slice(&buf[8..12]);
        let version = u32::from_le_bytes(word);
        long.copy_from_slice(&buf[12..20]);
        let length = u64::from_le_bytes(long);

        Ok(Fields {
            length,
            flags,
            type_code,
            version,
        })
    }
}

/// An 8-byte header for small, unversioned records
#[derive(Clone, Copy, Debug, Default)]
pub struct CompactHeader;

impl HeaderSpec for CompactHeader {
    fn name(&self) -> &'static str {
        "compact"
    }

    fn header_size(&self) -> usize {
        COMPACT_HEADER_SIZE
    }

    fn serialize(&self, fields: &Fields, buf: &mut [u8]) -> Result<()> {
        check_len(self, buf.len())?;

        let length = u32::try_from(fields.length).map_err(|_| {
            Error::invalid_header(format!(
                "length {} does not fit a compact header",
                fields.length
            ))
        })?;
        let type_code = u16::try_from(fields.type_code).map_err(|_| {
            Error::invalid_header(format!(
                "type code {:#x} does not fit a compact header",
                fields.type_code
            ))
        })?;
        if fields.version != 0 {
            return Err(Error::invalid_header(
                "compact headers cannot carry a version",
            ));
        }

        buf[0..4].copy_from_slice(&length.to_le_bytes());
        buf[4..6].copy_from_slice(&fields.flags.bits().to_le_bytes());
        buf[6..8].copy_from_slice(&type_code.to_le_bytes());
        Ok(())
    }

    fn deserialize(&self, buf: &[u8]) -> Result<Fields> {
        check_len(self, buf.len())?;

        Ok(Fields {
            length: u64::from(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
            flags: RecordFlags::from_bits(u16::from_le_bytes([buf[4], buf[5]])),
            type_code: u32::from(u16::from_le_bytes([buf[6], buf[7]])),
            version: 0,
        })
    }
}
