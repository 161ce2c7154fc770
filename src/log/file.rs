//! Append Log
//!
//! Owns the log file handle and the logical write offset.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::SyncStrategy;
use crate::error::{KvError, Result};

use super::{Entry, EntryHeader, LogIter, HEADER_SIZE};

/// A single append-only log file.
///
/// `offset` is the authoritative append position and always equals the end
/// of written data. Appends use positional writes at `offset` instead of
/// seeking to end-of-file, and reads use positional reads, so `read_at`
/// only needs `&self` and readers never share a file cursor.
pub struct AppendLog {
    /// Where the log currently lives on disk
    path: PathBuf,
    /// Read+write handle, held for the lifetime of the log
    file: File,
    /// Next append position / logical end of data
    offset: u64,
    sync_strategy: SyncStrategy,
}

impl AppendLog {
    /// Open an existing log or create an empty one.
    ///
    /// Never truncates: the write offset starts at the current file size.
    pub fn open_or_create(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let offset = file.metadata()?.len();
        debug!(path = %path.display(), offset, "opened log file");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset,
            sync_strategy,
        })
    }

    /// Create an empty log at `path`, discarding whatever was there
    pub fn create_fresh(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        Self::remove_stale(path)?;
        Self::open_or_create(path, sync_strategy)
    }

    /// Remove a leftover file, returning whether one existed
    pub fn remove_stale(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Append an entry, returning the offset it was written at.
    ///
    /// The offset only advances once the whole frame is written. On a failed
    /// write the file is cut back to `offset`, dropping any partial frame.
    /// After a successful write, bytes left past the new end (a partial
    /// frame whose cut failed earlier) are trimmed, so the physical length
    /// matches `offset` and replay never decodes leftovers as frames.
    pub fn append(&mut self, entry: &Entry) -> Result<u64> {
        let frame = entry.encode()?;
        let written_at = self.offset;

        if let Err(e) = self.write_frame(&frame, written_at) {
            if let Err(cut) = self.file.set_len(written_at) {
                warn!(offset = written_at, "failed to drop partial frame: {}", cut);
            }
            return Err(e);
        }

        self.offset += frame.len() as u64;

        if let Err(e) = self.trim_tail() {
            warn!(offset = self.offset, "failed to trim bytes past end of log: {}", e);
        }

        Ok(written_at)
    }

    fn write_frame(&self, frame: &[u8], at: u64) -> Result<()> {
        write_all_at(&self.file, frame, at)?;
        if self.sync_strategy == SyncStrategy::EveryWrite {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Drop anything physically stored past `offset`
    fn trim_tail(&self) -> Result<()> {
        if self.file.metadata()?.len() > self.offset {
            self.file.set_len(self.offset)?;
        }
        Ok(())
    }

    /// Read the entry whose frame starts at `offset`.
    ///
    /// Returns `Ok(None)` when `offset` is at or past the end of written
    /// data, and `TruncatedFrame` when the frame starting there runs past it.
    pub fn read_at(&self, offset: u64) -> Result<Option<Entry>> {
        if offset >= self.offset {
            return Ok(None);
        }

        if offset + HEADER_SIZE as u64 > self.offset {
            return Err(KvError::TruncatedFrame { offset });
        }

        let mut header_buf = [0u8; HEADER_SIZE];
        self.read_exact_at(&mut header_buf, offset, offset)?;
        let header = EntryHeader::decode(&header_buf)?;

        // Reject before allocating: a corrupt size field could be huge
        if offset + header.frame_size() > self.offset {
            return Err(KvError::TruncatedFrame { offset });
        }

        let key_size = header.key_size as usize;
        let mut payload = vec![0u8; key_size + header.value_size as usize];
        self.read_exact_at(&mut payload, offset + HEADER_SIZE as u64, offset)?;
        let value = payload.split_off(key_size);

        Ok(Some(Entry {
            key: payload,
            value,
            marker: header.marker,
        }))
    }

    /// Sequential iterator over every frame, starting at offset 0
    pub fn iter(&self) -> LogIter<'_> {
        LogIter::new(self)
    }

    /// Force written frames to disk
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Cut the file back to `len` bytes and move the write offset there
    pub fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.offset = len;
        Ok(())
    }

    /// Record that the underlying file has been renamed to `path`
    pub fn rebind(&mut self, path: &Path) {
        self.path = path.to_path_buf();
    }

    /// Logical size in bytes (the next append offset)
    pub fn size(&self) -> u64 {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_exact_at(&self, buf: &mut [u8], pos: u64, frame_offset: u64) -> Result<()> {
        match read_exact_at(&self.file, buf, pos) {
            Ok(()) => Ok(()),
            // File shorter than the tracked offset
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(KvError::TruncatedFrame {
                offset: frame_offset,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for AppendLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendLog")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .finish()
    }
}

// =============================================================================
// Positional I/O
// =============================================================================

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], pos: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, pos)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], pos: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, pos)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut pos: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, pos) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                let rest = buf;
                buf = &mut rest[n..];
                pos += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut pos: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, pos) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                pos += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
