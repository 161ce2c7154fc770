//! Index Module
//!
//! In-memory map from key to the offset of that key's latest PUT frame.
//!
//! ## Responsibilities
//! - O(1) key → offset lookups for `get`
//! - Rebuild itself by replaying the log on open
//! - Never persisted; the log is the only source of truth

use std::collections::HashMap;

use tracing::warn;

use crate::error::Result;
use crate::log::{AppendLog, Entry, Marker};

/// Key → offset of the latest PUT frame for that key.
///
/// A key is present only while its latest frame is a PUT; a tombstone
/// removes it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Index {
    offsets: HashMap<Vec<u8>, u64>,
}

/// Outcome of rebuilding the index from a log
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Number of complete frames read
    pub entries_replayed: u64,

    /// PUT frames among them
    pub puts: u64,

    /// Tombstones among them
    pub deletes: u64,

    /// Length of the valid prefix of the log
    pub valid_len: u64,

    /// Bytes of partial frame found after the valid prefix
    pub torn_tail_bytes: u64,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild by replaying `log` from offset 0.
    ///
    /// A frame that runs past the end of the file is treated as the end of
    /// the log (a torn tail from an interrupted append) and reported in
    /// [`ReplayReport::torn_tail_bytes`]. Any other error aborts the replay.
    pub fn rebuild(log: &AppendLog) -> Result<(Self, ReplayReport)> {
        let mut index = Self::new();
        let mut report = ReplayReport::default();

        let mut frames = log.iter();
        while let Some(item) = frames.next() {
            match item {
                Ok((offset, entry)) => {
                    match entry.marker {
                        Marker::Put => report.puts += 1,
                        Marker::Delete => report.deletes += 1,
                    }
                    report.entries_replayed += 1;
                    index.apply(entry, offset);
                }
                Err(e) if e.is_truncation() => {
                    warn!(offset = frames.position(), "partial frame at end of log: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        report.valid_len = frames.position();
        report.torn_tail_bytes = log.size() - report.valid_len;

        Ok((index, report))
    }

    /// Apply a replayed frame found at `offset`
    pub fn apply(&mut self, entry: Entry, offset: u64) {
        match entry.marker {
            Marker::Put => {
                self.offsets.insert(entry.key, offset);
            }
            Marker::Delete => {
                self.offsets.remove(&entry.key);
            }
        }
    }

    pub fn insert(&mut self, key: Vec<u8>, offset: u64) -> Option<u64> {
        self.offsets.insert(key, offset)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<u64> {
        self.offsets.remove(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.offsets.contains_key(key)
    }

    /// Whether the frame at `offset` is the live one for `key`
    pub fn is_live(&self, key: &[u8], offset: u64) -> bool {
        self.get(key) == Some(offset)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Live keys in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.offsets.keys().map(|k| k.as_slice())
    }
}
