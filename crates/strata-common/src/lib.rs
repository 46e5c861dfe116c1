//! Strata Common - Shared types and utilities
//!
//! This crate provides the error type and configuration structures
//! shared by the Strata storage crates.

pub mod config;
pub mod error;

pub use config::{CodecConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RECORD_SIZE};
pub use error::{Error, Result};
