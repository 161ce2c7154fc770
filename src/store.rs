//! Store Module
//!
//! The public key-value API that coordinates the index and the log.
//!
//! ## Responsibilities
//! - Rebuild the index from the log on open
//! - Replace-on-write: every `put` appends and re-points the index
//! - Tombstone-on-delete: `delete` appends a DELETE frame so replay forgets
//!   the key
//! - Reader/writer exclusion over index + log

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::index::{Index, ReplayReport};
use crate::log::{AppendLog, Entry, Marker};

/// Summary of the store's current footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Keys with a live value
    pub live_keys: usize,
    /// Bytes of written log data
    pub log_size: u64,
}

/// State guarded by the store lock
pub(crate) struct Inner {
    pub(crate) index: Index,
    pub(crate) log: AppendLog,
}

/// An open key-value store
///
/// ## Concurrency Model
///
/// One `RwLock` guards both the index and the log:
/// - **Reads** (`get`): shared guard, run concurrently. Log reads are
///   positional, so they need no exclusive file access.
/// - **Writes** (`put`/`delete`/`merge`): exclusive guard, so the index is
///   never observed mid-update.
///
/// The log file handle is opened once and released when the store drops.
pub struct Store {
    config: Config,
    pub(crate) inner: RwLock<Inner>,
}

impl Store {
    // =========================================================================
    // File Names
    // =========================================================================
    pub const LOG_FILENAME: &'static str = "logkv.data";
    pub const MERGE_FILENAME: &'static str = "logkv.data.merge";

    /// Open or create a store in `path` with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().data_dir(path.as_ref()).build();
        Self::open_with_config(config)
    }

    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create data directory if missing
    /// 2. Discard a merge file left by an interrupted merge
    /// 3. Open/create the log
    /// 4. Replay the log to rebuild the index
    /// 5. Cut off a partial trailing frame, if any
    pub fn open_with_config(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory
        fs::create_dir_all(&config.data_dir)?;

        // Step 2: A merge file here never finished its swap
        let merge_path = config.data_dir.join(Self::MERGE_FILENAME);
        if AppendLog::remove_stale(&merge_path)? {
            warn!(path = %merge_path.display(), "removed leftover merge file");
        }

        // Step 3: Open log
        let log_path = config.data_dir.join(Self::LOG_FILENAME);
        let mut log = AppendLog::open_or_create(&log_path, config.sync_strategy)?;

        // Step 4: Replay
        let (index, report) = Index::rebuild(&log)?;

        // Step 5: Appends must not land behind a torn frame
        if report.torn_tail_bytes > 0 {
            warn!(
                valid_len = report.valid_len,
                torn_bytes = report.torn_tail_bytes,
                "truncating partial frame at end of log"
            );
            log.truncate_to(report.valid_len)?;
        }

        Self::log_replay(&log_path, &report, index.len());

        Ok(Self {
            config,
            inner: RwLock::new(Inner { index, log }),
        })
    }

    /// Get the value for `key`.
    ///
    /// Returns `Ok(None)` for an empty key or a key with no live value;
    /// neither touches the disk.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if key.is_empty() {
            return Ok(None);
        }

        let inner = self.inner.read();

        let offset = match inner.index.get(key) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        match inner.log.read_at(offset)? {
            Some(entry) if entry.marker == Marker::Put => Ok(Some(entry.value)),
            // Index points at a tombstone or past the end: never valid
            _ => Err(KvError::IndexInconsistent { offset }),
        }
    }

    /// Put a key-value pair.
    ///
    /// An empty key is ignored. The index only moves once the append
    /// has succeeded.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write();

        let offset = inner.log.append(&Entry::put(key, value))?;
        inner.index.insert(key.to_vec(), offset);

        Ok(())
    }

    /// Delete a key.
    ///
    /// An empty key or a key with no live value is ignored. Otherwise a
    /// tombstone is appended so a later replay also forgets the key.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write();

        if !inner.index.contains_key(key) {
            return Ok(());
        }

        inner.log.append(&Entry::tombstone(key))?;
        inner.index.remove(key);

        Ok(())
    }

    /// Whether `key` currently has a live value (no disk I/O)
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.inner.read().index.contains_key(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().index.is_empty()
    }

    /// Snapshot of live keys, unordered
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.inner.read().index.keys().map(|k| k.to_vec()).collect()
    }

    pub fn stats(&self) -> Stats {
        let inner = self.inner.read();
        Stats {
            live_keys: inner.index.len(),
            log_size: inner.log.size(),
        }
    }

    /// Force all appended frames to disk
    pub fn sync(&self) -> Result<()> {
        self.inner.read().log.sync()
    }

    /// Sync and release the log file
    pub fn close(self) -> Result<()> {
        self.sync()?;
        debug!(path = %self.log_path().display(), "closing store");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the canonical log file
    pub fn log_path(&self) -> PathBuf {
        self.config.data_dir.join(Self::LOG_FILENAME)
    }

    pub(crate) fn merge_path(&self) -> PathBuf {
        self.config.data_dir.join(Self::MERGE_FILENAME)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn log_replay(path: &Path, report: &ReplayReport, live_keys: usize) {
        info!(
            path = %path.display(),
            entries = report.entries_replayed,
            puts = report.puts,
            deletes = report.deletes,
            live_keys,
            log_size = report.valid_len,
            "store opened"
        );
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("data_dir", &self.config.data_dir)
            .field("stats", &self.stats())
            .finish()
    }
}
