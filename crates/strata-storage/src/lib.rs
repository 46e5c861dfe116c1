//! Strata Storage Engine - Record files
//!
//! This crate implements the record container format used beneath
//! write-ahead logs and sorted-table files:
//! - Pluggable fixed-size header formats
//! - Chunked buffer arena for record payloads
//! - Sequential reader and writer with optional LZ4 compression
//! - File-backed and in-memory byte streams

pub mod arena;
pub mod compress;
pub mod header;
pub mod input;
pub mod output;
pub mod record;
pub mod stream;

// Re-exports
pub use arena::{AllocatorStats, RecordBufferAllocator};
pub use header::{
    COMPACT_HEADER_SIZE, CompactHeader, Fields, HeaderSpec, STANDARD_HEADER_SIZE, StandardHeader,
    default_header_spec,
};
pub use input::{FileInput, ReadOutcome, Records};
pub use output::FileOutput;
pub use record::{Record, RecordFlags};
pub use stream::{ByteStream, FileStream, MemoryStream, SharedStream, shared};
