//! Byte streams underneath record files
//!
//! Readers and writers talk to a [`ByteStream`] through a shared,
//! lockable handle. Short reads are reported by returning fewer bytes
//! than requested; they only happen at end of stream.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use strata_common::{Error, Result};

/// Default buffer size for file streams
const FILE_BUFFER_SIZE: usize = 64 * 1024;

/// Sequential, seekable byte stream
pub trait ByteStream: Send {
    /// Fill as much of `buf` as the stream holds; fewer bytes means end of stream
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf`, returning the number of bytes accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Move to an absolute offset
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current absolute offset
    fn tell(&mut self) -> Result<u64>;

    /// Push buffered writes to the underlying stream
    fn flush(&mut self) -> Result<()>;

    /// Make written data durable, where the stream supports it
    fn sync(&mut self) -> Result<()> {
        self.flush()
    }

    /// Stream name for diagnostics
    fn name(&self) -> &str;
}

/// Shared handle to a stream; cloning shares the stream
pub type SharedStream<S = dyn ByteStream> = Arc<Mutex<S>>;

/// Wrap a stream in a shared handle
pub fn shared<S: ByteStream>(stream: S) -> SharedStream<S> {
    Arc::new(Mutex::new(stream))
}

/// Read until `buf` is full or the reader is exhausted
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

enum FileMode {
    Read(BufReader<File>),
    Write(BufWriter<File>),
}

/// Buffered file stream
pub struct FileStream {
    inner: FileMode,
    path: String,
}

impl FileStream {
    /// Open an existing file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let file = File::open(&path)
            .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("failed to open {path_str}: {e}"))))?;

        Ok(Self {
            inner: FileMode::Read(BufReader::with_capacity(FILE_BUFFER_SIZE, file)),
            path: path_str,
        })
    }

    /// Create (or truncate) a file for writing
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("failed to create {path_str}: {e}"))))?;

        Ok(Self {
            inner: FileMode::Write(BufWriter::with_capacity(FILE_BUFFER_SIZE, file)),
            path: path_str,
        })
    }

    /// Open (or create) a file for writing, positioned at its end
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("failed to open {path_str}: {e}"))))?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            inner: FileMode::Write(BufWriter::with_capacity(FILE_BUFFER_SIZE, file)),
            path: path_str,
        })
    }

    /// File path
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ByteStream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.inner {
            FileMode::Read(reader) => Ok(read_full(reader, buf)?),
            FileMode::Write(writer) => {
                writer.flush()?;
                Ok(read_full(writer.get_mut(), buf)?)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match &mut self.inner {
            FileMode::Read(_) => Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is open read-only", self.path),
            ))),
            FileMode::Write(writer) => {
                writer.write_all(buf)?;
                Ok(buf.len())
            }
        }
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        match &mut self.inner {
            FileMode::Read(reader) => reader.seek(SeekFrom::Start(pos))?,
            FileMode::Write(writer) => writer.seek(SeekFrom::Start(pos))?,
        };
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        let pos = match &mut self.inner {
            FileMode::Read(reader) => reader.stream_position()?,
            FileMode::Write(writer) => writer.stream_position()?,
        };
        Ok(pos)
    }

    fn flush(&mut self) -> Result<()> {
        if let FileMode::Write(writer) = &mut self.inner {
            writer.flush()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if let FileMode::Write(writer) = &mut self.inner {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.path
    }
}

/// In-memory byte stream
#[derive(Debug, Default)]
pub struct MemoryStream {
    name: String,
    cursor: Cursor<Vec<u8>>,
}

impl MemoryStream {
    /// Create an empty stream
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cursor: Cursor::new(Vec::new()),
        }
    }

    /// Create a stream over existing bytes, positioned at the start
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            cursor: Cursor::new(data),
        }
    }

    /// Everything written so far
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    /// Total stream length
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Drop everything past `len`
    pub fn truncate(&mut self, len: usize) {
        self.cursor.get_mut().truncate(len);
    }

    /// Take the underlying bytes
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl ByteStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(read_full(&mut self.cursor, buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.cursor.write_all(buf)?;
        Ok(buf.len())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.cursor.set_position(pos);
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.cursor.position())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_stream() {
        let mut stream = MemoryStream::new("mem");
        assert_eq!(stream.write(b"hello world").unwrap(), 11);
        assert_eq!(stream.tell().unwrap(), 11);

        stream.seek(6).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"world");

        // At end of stream
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_stream_truncate() {
        let mut stream = MemoryStream::from_bytes("mem", b"abcdef".to_vec());
        stream.truncate(3);
        let mut buf = [0u8; 6];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        assert_eq!(stream.into_inner(), b"abc");
    }

    #[test]
    fn test_file_stream_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.dat");

        {
            let mut stream = FileStream::create(&path).unwrap();
            stream.write(b"0123456789").unwrap();
            assert_eq!(stream.tell().unwrap(), 10);

            // Reading through a write stream sees flushed data
            stream.seek(4).unwrap();
            let mut buf = [0u8; 3];
            assert_eq!(stream.read(&mut buf).unwrap(), 3);
            assert_eq!(&buf, b"456");
            stream.sync().unwrap();
        }

        let mut stream = FileStream::open(&path).unwrap();
        stream.seek(8).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert!(stream.write(b"x").is_err());
    }

    #[test]
    fn test_file_stream_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.dat");

        {
            let mut stream = FileStream::create(&path).unwrap();
            stream.write(b"abc").unwrap();
            stream.flush().unwrap();
        }

        let mut stream = FileStream::open_append(&path).unwrap();
        assert_eq!(stream.tell().unwrap(), 3);
        stream.write(b"def").unwrap();
        stream.flush().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
        assert!(stream.name().ends_with("log.dat"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let err = FileStream::open(dir.path().join("missing")).err().unwrap();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }
}
