//! Log entry definitions
//!
//! Defines the frame layout of a single record and converts between
//! [`Entry`] values and their byte encoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{KvError, Result};

/// Header size: KeySize (4) + ValueSize (4) + Marker (2) = 10 bytes
pub const HEADER_SIZE: usize = 10;

/// Whether a frame stores a value or records a deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Marker {
    /// A live key-value pair
    Put = 0,

    /// A tombstone; carries no value
    Delete = 1,
}

impl Marker {
    /// Parse the on-disk marker value
    pub fn from_u16(raw: u16) -> Result<Self> {
        match raw {
            0 => Ok(Marker::Put),
            1 => Ok(Marker::Delete),
            other => Err(KvError::MalformedFrame(format!(
                "unknown marker {}",
                other
            ))),
        }
    }

    /// The on-disk marker value
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A single record in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub marker: Marker,
}

impl Entry {
    /// Build a PUT entry
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            marker: Marker::Put,
        }
    }

    /// Build a DELETE entry (tombstone) with an empty value
    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            marker: Marker::Delete,
        }
    }

    /// Whether this entry records a deletion
    pub fn is_tombstone(&self) -> bool {
        self.marker == Marker::Delete
    }

    /// Size of the encoded frame in bytes.
    ///
    /// Always equal to `encode()?.len()`; the log advances its write offset
    /// by exactly this amount.
    pub fn encoded_size(&self) -> u64 {
        HEADER_SIZE as u64 + self.key.len() as u64 + self.value.len() as u64
    }

    /// The fixed header describing this entry
    pub fn header(&self) -> Result<EntryHeader> {
        Ok(EntryHeader {
            key_size: size_field(self.key.len())?,
            value_size: size_field(self.value.len())?,
            marker: self.marker,
        })
    }

    /// Encode to `[key_size][value_size][marker][key][value]`, big-endian
    pub fn encode(&self) -> Result<Bytes> {
        let header = self.header()?;

        let mut buf = BytesMut::with_capacity(self.encoded_size() as usize);
        header.encode_into(&mut buf);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);

        Ok(buf.freeze())
    }
}

/// The fixed-size prefix of every frame.
///
/// Decoding a header yields only the sizes and marker; the key and value
/// bytes follow it in the log and are read separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub key_size: u32,
    pub value_size: u32,
    pub marker: Marker,
}

impl EntryHeader {
    /// Parse a header from exactly [`HEADER_SIZE`] bytes
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != HEADER_SIZE {
            return Err(KvError::MalformedFrame(format!(
                "header must be {} bytes, got {}",
                HEADER_SIZE,
                buf.len()
            )));
        }

        let mut buf = buf;
        let key_size = buf.get_u32();
        let value_size = buf.get_u32();
        let marker = Marker::from_u16(buf.get_u16())?;

        Ok(Self {
            key_size,
            value_size,
            marker,
        })
    }

    /// Append the encoded header to `buf`
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.key_size);
        buf.put_u32(self.value_size);
        buf.put_u16(self.marker.as_u16());
    }

    /// Total size of the frame this header describes
    pub fn frame_size(&self) -> u64 {
        HEADER_SIZE as u64 + self.key_size as u64 + self.value_size as u64
    }
}

fn size_field(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| KvError::EntryTooLarge { len })
}
