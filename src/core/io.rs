//! Byte sources and little-endian helpers for cartridge images
//!
//! A [`ByteView`] is either an exclusive in-memory buffer or a window into a
//! shared backing buffer (an owned `Vec<u8>` or a read-only memory map of a
//! file on disk). Windows never mutate their backing; editing a file always
//! replaces its view with a freshly owned one.

use crate::error::{NitroError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Storage behind one or more views
pub enum Backing {
    /// Heap buffer
    Owned(Vec<u8>),
    /// Read-only mapping of a file on disk
    Mapped(Mmap),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Owned(data) => data,
            Backing::Mapped(map) => map,
        }
    }
}

/// Immutable view of `len` bytes starting at `offset` inside a backing buffer
#[derive(Clone)]
pub struct ByteView {
    backing: Arc<Backing>,
    offset: usize,
    len: usize,
}

impl ByteView {
    /// Wrap an owned buffer
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        ByteView {
            backing: Arc::new(Backing::Owned(data)),
            offset: 0,
            len,
        }
    }

    /// Empty view
    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Map a file from disk without reading it into memory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            // Zero-length mappings are rejected on some platforms
            return Ok(Self::empty());
        }

        // SAFETY: the mapping is read-only and the view never hands out
        // mutable access; external modification of the file while mapped is
        // outside what this crate supports.
        let map = unsafe { Mmap::map(&file)? };
        Ok(ByteView {
            backing: Arc::new(Backing::Mapped(map)),
            offset: 0,
            len,
        })
    }

    /// Create a window sharing this view's backing buffer
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| NitroError::malformed("window range overflows"))?;
        if end > self.len {
            return Err(NitroError::malformed(format!(
                "window {:#x}..{:#x} exceeds source of {:#x} bytes",
                offset, end, self.len
            )));
        }

        Ok(ByteView {
            backing: Arc::clone(&self.backing),
            offset: self.offset + offset,
            len,
        })
    }

    /// Copy the viewed bytes into a new private buffer
    pub fn to_owned_view(&self) -> Self {
        Self::from_vec(self.as_slice().to_vec())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.backing.as_slice()[self.offset..self.offset + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this window inside its backing buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True when another view aliases the same backing buffer
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.backing) > 1
    }

    /// True when both views alias the same backing buffer
    pub fn shares_backing_with(&self, other: &ByteView) -> bool {
        Arc::ptr_eq(&self.backing, &other.backing)
    }

    /// Write the viewed bytes to a sink
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_all(self.as_slice())?;
        Ok(())
    }

    /// Write the viewed bytes to a file on disk
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)?;
        file.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteView")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl PartialEq for ByteView {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteView {}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }
}

/// Bounds-checked little-endian cursor over a byte slice
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(NitroError::malformed(format!(
                "seek to {:#x} past end of {:#x} bytes",
                pos,
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                NitroError::malformed(format!(
                    "read of {} bytes at {:#x} past end of {:#x} bytes",
                    len,
                    self.pos,
                    self.data.len()
                ))
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

/// Round `value` up to the next multiple of `alignment`
pub fn align_up(value: usize, alignment: usize) -> usize {
    match value % alignment {
        0 => value,
        rem => value + (alignment - rem),
    }
}

/// Append `byte` until `buf.len()` is a multiple of `alignment`
pub fn pad_to_alignment(buf: &mut Vec<u8>, byte: u8, alignment: usize) {
    let target = align_up(buf.len(), alignment);
    buf.resize(target, byte);
}

/// Append `byte` until `buf` is `len` bytes long (no-op if already longer)
pub fn pad_to_length(buf: &mut Vec<u8>, byte: u8, len: usize) {
    if buf.len() < len {
        buf.resize(len, byte);
    }
}
