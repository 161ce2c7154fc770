//! Compaction: rewrites the log keeping only live frames.
//!
//! A frame at offset `p` is live iff the index currently maps its key to
//! `p`. Overwritten PUTs and every tombstone fail that test, so no
//! per-frame versioning is needed. Survivors are written to a separate
//! merge file which is then renamed over the canonical log.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{KvError, Result};
use crate::log::{AppendLog, Entry};
use crate::store::{Inner, Store};

/// Outcome of a merge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Frames in the log before the merge
    pub frames_before: u64,
    /// Frames kept (one per live key)
    pub frames_after: u64,
    /// Log size before the merge
    pub bytes_before: u64,
    /// Log size after the merge
    pub bytes_after: u64,
}

impl MergeReport {
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

impl Store {
    /// Compact the log down to one frame per live key.
    ///
    /// Holds the exclusive lock for the whole run. The index and the old log
    /// are only touched once the new log has been renamed into place; on any
    /// earlier failure the merge file is removed and the store is left
    /// exactly as it was.
    ///
    /// An empty log returns immediately. A log with no live keys is
    /// replaced by an empty one.
    pub fn merge(&self) -> Result<MergeReport> {
        let mut inner = self.inner.write();

        if inner.log.is_empty() {
            return Ok(MergeReport::default());
        }

        let merge_path = self.merge_path();
        let log_path = self.log_path();

        match self.rewrite(&inner, &merge_path, &log_path) {
            Ok((new_log, offsets, mut report)) => {
                // Old handle drops here, releasing the replaced file
                inner.log = new_log;
                for (key, offset) in offsets {
                    inner.index.insert(key, offset);
                }
                report.bytes_after = inner.log.size();

                info!(
                    frames_before = report.frames_before,
                    frames_after = report.frames_after,
                    bytes_before = report.bytes_before,
                    bytes_after = report.bytes_after,
                    "merge complete"
                );
                Ok(report)
            }
            Err(e) => {
                warn!("merge aborted, keeping original log: {}", e);
                if let Err(cleanup) = AppendLog::remove_stale(&merge_path) {
                    warn!(path = %merge_path.display(), "failed to remove merge file: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Write live frames to the merge file and rename it over the log.
    ///
    /// Returns the new log and the staged key → offset updates.
    fn rewrite(
        &self,
        inner: &Inner,
        merge_path: &Path,
        log_path: &Path,
    ) -> Result<(AppendLog, HashMap<Vec<u8>, u64>, MergeReport)> {
        let mut report = MergeReport {
            bytes_before: inner.log.size(),
            ..MergeReport::default()
        };

        // Step 1: Collect live frames in log order
        let mut live: Vec<Entry> = Vec::with_capacity(inner.index.len());
        for item in inner.log.iter() {
            let (offset, entry) = item?;
            report.frames_before += 1;
            if inner.index.is_live(&entry.key, offset) {
                live.push(entry);
            }
        }

        if live.len() != inner.index.len() {
            return Err(KvError::Merge(format!(
                "found {} live frames for {} indexed keys",
                live.len(),
                inner.index.len()
            )));
        }

        // Step 2: Write them to a fresh merge file
        let mut merged = AppendLog::create_fresh(merge_path, self.config().sync_strategy)?;
        let mut offsets = HashMap::with_capacity(live.len());
        for entry in live {
            let offset = merged.append(&entry)?;
            offsets.insert(entry.key, offset);
        }
        report.frames_after = offsets.len() as u64;

        // Step 3: Make it durable, then swap it in
        merged.sync()?;
        std::fs::rename(merge_path, log_path)?;
        merged.rebind(log_path);

        // Past the rename the new log is live; failing here would desync
        // the in-memory state from disk
        if let Err(e) = sync_dir(self.data_dir()) {
            warn!("failed to sync data directory after merge: {}", e);
        }

        debug!(path = %log_path.display(), size = merged.size(), "merge file renamed over log");

        Ok((merged, offsets, report))
    }
}

/// Persist a rename by syncing the parent directory
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    std::fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
