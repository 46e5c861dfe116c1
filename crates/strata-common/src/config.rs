//! Configuration types for Strata
//!
//! This module defines the configuration shared by record readers and writers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default arena chunk size for record buffers (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Default upper bound on a single record's logical length (1 GiB)
pub const DEFAULT_MAX_RECORD_SIZE: u64 = 1 << 30;

/// Record codec configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Minimum size of each record buffer arena chunk
    pub allocator_chunk_size: usize,
    /// Largest logical record length a reader will accept
    pub max_record_size: u64,
    /// Request compression for every record written
    pub compress_by_default: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            allocator_chunk_size: DEFAULT_CHUNK_SIZE,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            compress_by_default: false,
        }
    }
}

impl CodecConfig {
    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.allocator_chunk_size == 0 {
            return Err(Error::configuration("allocator_chunk_size must be non-zero"));
        }
        if self.max_record_size == 0 {
            return Err(Error::configuration("max_record_size must be non-zero"));
        }
        Ok(())
    }
}
