//! # logkv
//!
//! An embedded key-value store built on:
//! - A single append-only log file
//! - A full in-memory index rebuilt from the log on open
//! - Merge (compaction) that rewrites the log with live frames only
//! - Single reader/writer lock: concurrent reads, exclusive writes
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │            put / get / delete / merge  (RwLock)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Index    │          │  AppendLog  │
//!   │ key→offset  │─────────▶│ (one file)  │
//!   └─────────────┘ read_at  └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ Entry codec │
//!                           │  (frames)   │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use logkv::Store;
//!
//! let store = Store::open("/tmp/logkv").unwrap();
//! store.put(b"hello", b"world").unwrap();
//! assert_eq!(store.get(b"hello").unwrap(), Some(b"world".to_vec()));
//! store.delete(b"hello").unwrap();
//! store.merge().unwrap();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod log;
pub mod index;
pub mod store;
pub mod compaction;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, SyncStrategy};
pub use store::{Stats, Store};
pub use compaction::MergeReport;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of logkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
