//! Sequential record writer
//!
//! Compression is attempted only for records that ask for it, and kept
//! only when it makes the payload strictly smaller. Otherwise the frame
//! is written with the compression bit cleared and the original bytes.

use crate::compress::{self, EXTRA_LENGTH_SIZE};
use crate::header::{Fields, HeaderSpec, default_header_spec};
use crate::record::{Record, RecordFlags};
use crate::stream::{ByteStream, SharedStream};
use std::sync::Arc;
use strata_common::{CodecConfig, DEFAULT_MAX_RECORD_SIZE, Error, Result};
use tracing::{debug, trace};

/// Record encoder bound to a stream and a header format
pub struct FileOutput<S: ByteStream + ?Sized = dyn ByteStream> {
    stream: SharedStream<S>,
    spec: Arc<dyn HeaderSpec>,
    compress_by_default: bool,
    max_record_size: u64,
    header_buf: Vec<u8>,
    scratch: Vec<u8>,
}

fn check_written(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(Error::ShortWrite {
            what,
            expected: expected as u64,
            actual: actual as u64,
        });
    }
    Ok(())
}

impl<S: ByteStream + ?Sized> FileOutput<S> {
    /// Writer using the default header format
    pub fn new(stream: SharedStream<S>) -> Self {
        Self::with_header_spec(stream, default_header_spec())
    }

    /// Writer using the given header format
    pub fn with_header_spec(stream: SharedStream<S>, spec: Arc<dyn HeaderSpec>) -> Self {
        let header_buf = vec![0u8; spec.header_size()];
        Self {
            stream,
            spec,
            compress_by_default: false,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            header_buf,
            scratch: Vec::new(),
        }
    }

    /// Writer configured from a [`CodecConfig`]
    pub fn with_config(stream: SharedStream<S>, config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        let mut output = Self::new(stream);
        output.compress_by_default = config.compress_by_default;
        output.max_record_size = config.max_record_size;
        Ok(output)
    }

    /// Append one record
    pub fn put(&mut self, record: &Record) -> Result<()> {
        let handle = Arc::clone(&self.stream);
        let mut stream = handle.lock();

        self.write_frame(&mut *stream, record)
            .map_err(|e| Error::write_record(record.to_string(), stream.name(), e))
    }

    fn write_frame(&mut self, stream: &mut S, record: &Record) -> Result<()> {
        // Readers with the same limit would reject anything longer
        let length = record.len() as u64;
        if length > self.max_record_size {
            return Err(Error::RecordTooLarge {
                length,
                limit: self.max_record_size,
            });
        }

        let mut fields = Fields::from_record(record);
        if self.compress_by_default {
            fields.flags.insert(RecordFlags::COMPRESSED);
        }

        let mut compressed_len = None;
        if fields.is_compressed() {
            match compress::compress_into(record.data(), &mut self.scratch)? {
                Some(size) if size < record.len() => compressed_len = Some(size),
                _ => {
                    debug!("storing {} uncompressed: compression did not shrink it", record);
                    fields.flags.remove(RecordFlags::COMPRESSED);
                }
            }
        }

        let payload = match compressed_len {
            Some(size) => {
                fields.length = size as u64;
                &self.scratch[..size]
            }
            None => record.data(),
        };

        let header_size = self.spec.header_size();
        self.spec.serialize(&fields, &mut self.header_buf)?;
        let written = stream.write(&self.header_buf[..header_size])?;
        check_written("header", header_size, written)?;

        if compressed_len.is_some() {
            let original = (record.len() as u64).to_le_bytes();
            let written = stream.write(&original)?;
            check_written("length field", EXTRA_LENGTH_SIZE, written)?;
        }

        let written = stream.write(payload)?;
        check_written("data", payload.len(), written)?;

        trace!(
            "wrote record: type={:#x} len={} disk_len={} compressed={}",
            fields.type_code,
            record.len(),
            payload.len(),
            compressed_len.is_some()
        );
        Ok(())
    }

    /// Push buffered bytes to the underlying stream
    pub fn flush(&mut self) -> Result<()> {
        self.stream.lock().flush()
    }

    /// Flush and make written records durable
    pub fn sync(&mut self) -> Result<()> {
        self.stream.lock().sync()
    }

    /// Current stream offset; the next record's frame starts here
    pub fn tell(&self) -> Result<u64> {
        self.stream.lock().tell()
    }

    /// Write to a different stream, starting with the next `put`
    pub fn set_stream(&mut self, stream: SharedStream<S>) {
        self.stream = stream;
    }

    /// Switch header formats
    pub fn set_header_spec(&mut self, spec: Arc<dyn HeaderSpec>) {
        self.header_buf = vec![0u8; spec.header_size()];
        self.spec = spec;
    }

    /// Request compression for every record, whatever its flags
    pub fn set_compress_by_default(&mut self, enabled: bool) {
        self.compress_by_default = enabled;
    }

    /// Refuse records whose length exceeds `limit`
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

    /// Diagnostic name: `<stream>#<offset>`
    pub fn name(&self) -> String {
        let mut stream = self.stream.lock();
        match stream.tell() {
            Ok(pos) => format!("{}#{}", stream.name(), pos),
            Err(_) => "null".to_string(),
        }
    }
}

impl<S: ByteStream + ?Sized> Clone for FileOutput<S> {
    fn clone(&self) -> Self {
        Self {
            stream: Arc::clone(&self.stream),
            spec: Arc::clone(&self.spec),
            compress_by_default: self.compress_by_default,
            max_record_size: self.max_record_size,
            header_buf: vec![0u8; self.spec.header_size()],
            scratch: Vec::new(),
        }
    }
}
