//! Log replay
//!
//! Sequential iteration over every frame in an [`AppendLog`].

use crate::error::Result;

use super::{AppendLog, Entry};

/// Iterator yielding `(offset, entry)` for each frame, oldest first.
///
/// Stops after the end-of-data signal or after the first error. On error,
/// [`position`](LogIter::position) still points at the frame that failed,
/// which is the length of the valid prefix of the log.
pub struct LogIter<'a> {
    log: &'a AppendLog,
    position: u64,
    done: bool,
}

impl<'a> LogIter<'a> {
    pub(super) fn new(log: &'a AppendLog) -> Self {
        Self {
            log,
            position: 0,
            done: false,
        }
    }

    /// Offset of the next frame to read
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Iterator for LogIter<'_> {
    type Item = Result<(u64, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.log.read_at(self.position) {
            Ok(Some(entry)) => {
                let offset = self.position;
                self.position += entry.encoded_size();
                Some(Ok((offset, entry)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
