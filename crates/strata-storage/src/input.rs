//! Sequential record reader
//!
//! Reads one frame per call:
//! ```text
//! +--------+-------------------+---------+
//! | Header | Original length   | Payload |
//! | spec   | 8B (compressed)   | var     |
//! +--------+-------------------+---------+
//! ```
//!
//! A clean end of stream (no bytes where a header should start) is
//! reported as [`ReadOutcome::EndOfStream`]. Anything else that goes wrong
//! after the frame has started is an error carrying the stream name and
//! the frame's starting offset.

use crate::arena::RecordBufferAllocator;
use crate::compress::{self, EXTRA_LENGTH_SIZE};
use crate::header::{HeaderSpec, default_header_spec};
use crate::record::Record;
use crate::stream::{ByteStream, SharedStream};
use std::sync::Arc;
use strata_common::{CodecConfig, DEFAULT_MAX_RECORD_SIZE, Error, Result};
use tracing::{trace, warn};

/// Result of a successful read attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete record
    Record(Record),
    /// No bytes left where the next header would start
    EndOfStream,
}

impl ReadOutcome {
    /// The record, if one was read
    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::EndOfStream => None,
        }
    }

    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Record decoder bound to a stream, a header format and an allocator
pub struct FileInput<S: ByteStream + ?Sized = dyn ByteStream> {
    stream: SharedStream<S>,
    spec: Arc<dyn HeaderSpec>,
    alloc: Arc<RecordBufferAllocator>,
    max_record_size: u64,
    header_buf: Vec<u8>,
    scratch: Vec<u8>,
}

impl<S: ByteStream + ?Sized> FileInput<S> {
    /// Reader using the default header format and a private allocator
    pub fn new(stream: SharedStream<S>) -> Self {
        Self::with_allocator(stream, Arc::new(RecordBufferAllocator::default()))
    }

    /// Reader with a private allocator of the given chunk size
    pub fn with_chunk_size(stream: SharedStream<S>, chunk_size: usize) -> Self {
        Self::with_allocator(stream, Arc::new(RecordBufferAllocator::new(chunk_size)))
    }

    /// Reader drawing payload buffers from a (possibly shared) allocator
    pub fn with_allocator(stream: SharedStream<S>, alloc: Arc<RecordBufferAllocator>) -> Self {
        Self::with_parts(stream, default_header_spec(), alloc)
    }

    /// Reader with every binding given explicitly
    pub fn with_parts(
        stream: SharedStream<S>,
        spec: Arc<dyn HeaderSpec>,
        alloc: Arc<RecordBufferAllocator>,
    ) -> Self {
        let header_buf = vec![0u8; spec.header_size()];
        Self {
            stream,
            spec,
            alloc,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            header_buf,
            scratch: Vec::new(),
        }
    }

    /// Reader configured from a [`CodecConfig`]
    pub fn with_config(stream: SharedStream<S>, config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        let mut input = Self::with_chunk_size(stream, config.allocator_chunk_size);
        input.max_record_size = config.max_record_size;
        Ok(input)
    }

    /// Read the next record
    pub fn get(&mut self) -> Result<ReadOutcome> {
        let handle = Arc::clone(&self.stream);
        let mut stream = handle.lock();

        let offset = match stream.tell() {
            Ok(offset) => offset,
            // Offset unknown
            Err(e) => return Err(Error::get_record(stream.name(), 0, e)),
        };
        match self.read_frame(&mut *stream) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("bad record frame at {}:{}: {}", stream.name(), offset, e);
                Err(Error::get_record(stream.name(), offset, e))
            }
        }
    }

    fn read_frame(&mut self, stream: &mut S) -> Result<ReadOutcome> {
        let header_size = self.spec.header_size();
        let got = stream.read(&mut self.header_buf[..header_size])?;
        if got == 0 {
            return Ok(ReadOutcome::EndOfStream);
        }
        if got < header_size {
            return Err(Error::ShortRead {
                what: "header",
                expected: header_size as u64,
                actual: got as u64,
            });
        }

        let mut fields = self.spec.deserialize(&self.header_buf)?;
        let disk_length = fields.length;
        let compressed = fields.is_compressed();

        if compressed {
            let mut extra = [0u8; EXTRA_LENGTH_SIZE];
            let got = stream.read(&mut extra)?;
            if got < EXTRA_LENGTH_SIZE {
                return Err(Error::ShortRead {
                    what: "length field",
                    expected: EXTRA_LENGTH_SIZE as u64,
                    actual: got as u64,
                });
            }
            fields.length = u64::from_le_bytes(extra);

            // Writers only keep compression when it shrinks the payload
            if disk_length >= fields.length {
                return Err(Error::corrupt_frame(format!(
                    "compressed length {} is not smaller than original length {}",
                    disk_length, fields.length
                )));
            }
        }

        if fields.length > self.max_record_size {
            return Err(Error::corrupt_frame(format!(
                "record length {} exceeds limit {}",
                fields.length, self.max_record_size
            )));
        }
        let logical = usize::try_from(fields.length)
            .map_err(|_| Error::corrupt_frame(format!("record length {} too large", fields.length)))?;
        // Bounded by the logical length checked above
        let disk = disk_length as usize;

        let mut data = self.alloc.alloc(&fields)?;

        if compressed {
            if self.scratch.len() < logical {
                self.scratch.resize(logical, 0);
            }
            let got = stream.read(&mut self.scratch[..disk])?;
            if got < disk {
                return Err(Error::ShortRead {
                    what: "record",
                    expected: disk_length,
                    actual: got as u64,
                });
            }
            compress::decompress_into(&self.scratch[..disk], &mut data)?;
        } else {
            let got = stream.read(&mut data)?;
            if got < logical {
                return Err(Error::ShortRead {
                    what: "record",
                    expected: disk_length,
                    actual: got as u64,
                });
            }
        }

        trace!(
            "read record: type={:#x} len={} disk_len={} compressed={}",
            fields.type_code, logical, disk, compressed
        );
        Ok(ReadOutcome::Record(Record::from_fields(&fields, data.freeze())))
    }

    /// Iterate over the remaining records
    pub fn records(&mut self) -> Records<'_, S> {
        Records {
            input: self,
            done: false,
        }
    }

    /// Reposition the stream; the next `get` starts a frame there
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.stream.lock().seek(pos)
    }

    /// Current stream offset
    pub fn tell(&self) -> Result<u64> {
        self.stream.lock().tell()
    }

    /// Read from a different stream, starting with the next `get`
    pub fn set_stream(&mut self, stream: SharedStream<S>) {
        self.stream = stream;
    }

    /// Switch header formats
    pub fn set_header_spec(&mut self, spec: Arc<dyn HeaderSpec>) {
        self.header_buf = vec![0u8; spec.header_size()];
        self.spec = spec;
    }

    /// Draw payload buffers from a different allocator
    pub fn set_allocator(&mut self, alloc: Arc<RecordBufferAllocator>) {
        self.alloc = alloc;
    }

    /// Reject records whose logical length exceeds `limit`
    pub fn set_max_record_size(&mut self, limit: u64) {
        self.max_record_size = limit;
    }

    /// Bound stream handle
    pub fn stream(&self) -> &SharedStream<S> {
        &self.stream
    }

    /// Bound header format
    pub fn header_spec(&self) -> &Arc<dyn HeaderSpec> {
        &self.spec
    }

    /// Bound allocator
    pub fn allocator(&self) -> &Arc<RecordBufferAllocator> {
        &self.alloc
    }

    /// Diagnostic name: `<stream>#<offset>`
    pub fn name(&self) -> String {
        let mut stream = self.stream.lock();
        match stream.tell() {
            Ok(pos) => format!("{}#{}", stream.name(), pos),
            Err(_) => "null".to_string(),
        }
    }
}

impl<S: ByteStream + ?Sized> Clone for FileInput<S> {
    fn clone(&self) -> Self {
        Self {
            stream: Arc::clone(&self.stream),
            spec: Arc::clone(&self.spec),
            alloc: Arc::clone(&self.alloc),
            max_record_size: self.max_record_size,
            header_buf: vec![0u8; self.spec.header_size()],
            scratch: Vec::new(),
        }
    }
}

/// Iterator over the records left in a [`FileInput`]
///
/// Ends at end of stream, or after yielding the first error.
pub struct Records<'a, S: ByteStream + ?Sized> {
    input: &'a mut FileInput<S>,
    done: bool,
}

impl<S: ByteStream + ?Sized> Iterator for Records<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.input.get() {
            Ok(ReadOutcome::Record(record)) => Some(Ok(record)),
            Ok(ReadOutcome::EndOfStream) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
