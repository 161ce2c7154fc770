//! Error types for logkv
//!
//! Provides a unified error type for all operations.
//!
//! Reaching the end of the log is not an error: positional reads report it
//! as `Ok(None)` so replay loops can tell it apart from real failures.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for logkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Frame Errors
    // -------------------------------------------------------------------------
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Truncated frame at offset {offset}")]
    TruncatedFrame { offset: u64 },

    #[error("Entry too large: {len} bytes does not fit a u32 size field")]
    EntryTooLarge { len: usize },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Index points at offset {offset} which holds no live value")]
    IndexInconsistent { offset: u64 },

    #[error("Merge failed: {0}")]
    Merge(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Whether this error means a frame ran past the written data.
    ///
    /// Replay treats this as a torn tail rather than a hard failure.
    pub fn is_truncation(&self) -> bool {
        matches!(self, KvError::TruncatedFrame { .. })
    }
}
