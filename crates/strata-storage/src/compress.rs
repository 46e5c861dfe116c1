//! Per-record payload compression (LZ4 block format)

use strata_common::{Error, Result};

/// Width of the original-length field that follows a compressed header
pub const EXTRA_LENGTH_SIZE: usize = 8;

/// Largest input accepted by the LZ4 block compressor
const MAX_INPUT_SIZE: usize = 0x7E00_0000;

/// Scratch capacity needed to compress `len` bytes
///
/// Allows 16 bytes per KiB of incompressible input, and never less than
/// the compressor's own bound.
#[must_use]
pub fn worst_case_size(len: usize) -> usize {
    let allowance = len + 16 * (1 + len / 1024);
    let bound = lz4::block::compress_bound(len).unwrap_or(allowance);
    allowance.max(bound)
}

/// Compress `src` into `scratch`, growing it as needed
///
/// Returns `None` when the payload cannot be compressed at all (empty or
/// too large for a single block); the caller stores it verbatim.
pub fn compress_into(src: &[u8], scratch: &mut Vec<u8>) -> Result<Option<usize>> {
    if src.is_empty() || src.len() > MAX_INPUT_SIZE {
        return Ok(None);
    }

    let needed = worst_case_size(src.len());
    if scratch.len() < needed {
        scratch.resize(needed, 0);
    }

    let size = lz4::block::compress_to_buffer(src, None, false, scratch)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(Some(size))
}

/// Decompress `src` into `dst`, which must end up exactly full
pub fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<()> {
    let expected = i32::try_from(dst.len()).map_err(|_| {
        Error::Decompression(format!("{} bytes is too large for one block", dst.len()))
    })?;

    let size = lz4::block::decompress_to_buffer(src, Some(expected), dst)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    if size != dst.len() {
        return Err(Error::Decompression(format!(
            "expanded to {} bytes, expected {}",
            size,
            dst.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_case_size() {
        assert_eq!(worst_case_size(0), 16);
        assert!(worst_case_size(1024) >= 1024 + 32);
        assert!(worst_case_size(1023) >= lz4::block::compress_bound(1023).unwrap());
    }

    #[test]
    fn test_compress_redundant_data() {
        let src = vec![b'z'; 10_000];
        let mut scratch = Vec::new();
        let size = compress_into(&src, &mut scratch).unwrap().unwrap();
        assert!(size < src.len());

        let mut out = vec![0u8; src.len()];
        decompress_into(&scratch[..size], &mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_empty_input_is_not_compressed() {
        let mut scratch = Vec::new();
        assert!(compress_into(&[], &mut scratch).unwrap().is_none());
    }

    #[test]
    fn test_decompress_garbage() {
        let mut out = vec![0u8; 64];
        assert!(decompress_into(&[0xFF, 0xFF, 0xFF], &mut out).is_err());
    }
}
