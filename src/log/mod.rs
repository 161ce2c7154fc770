//! Log Module
//!
//! The single append-only data file and its frame codec.
//!
//! ## Responsibilities
//! - Encode/decode one record into a fixed-header frame
//! - Append frames at the tracked write offset
//! - Positional reads of the frame at any offset
//! - Sequential replay from offset 0
//!
//! ## File Format
//! No file header, magic number or checksum; the file is just frames:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Frame 1                                                     │
//! │ ┌──────────────┬────────────────┬────────────┬─────┬───────┐ │
//! │ │ KeySize (4)  │ ValueSize (4)  │ Marker (2) │ Key │ Value │ │
//! │ └──────────────┴────────────────┴────────────┴─────┴───────┘ │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Frame 2 ...                                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//! All integers are big-endian. Marker 0 = PUT, 1 = DELETE.

mod entry;
mod file;
mod iter;

pub use entry::{Entry, EntryHeader, Marker, HEADER_SIZE};
pub use file::AppendLog;
pub use iter::LogIter;
