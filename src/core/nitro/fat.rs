//! File allocation table: one `(start, end)` pair per file id

use crate::error::{NitroError, Result};
use crate::io::ByteReader;

pub const FAT_ENTRY_SIZE: usize = 8;

/// Byte range of one file inside the image, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatEntry {
    pub start: u32,
    pub end: u32,
}

impl FatEntry {
    pub fn new(start: u32, end: u32) -> Self {
        FatEntry { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &FatEntry) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fat {
    entries: Vec<FatEntry>,
}

impl Fat {
    pub fn new(entries: Vec<FatEntry>) -> Self {
        Fat { entries }
    }

    pub fn entries(&self) -> &[FatEntry] {
        &self.entries
    }

    pub fn get(&self, file_id: usize) -> Option<FatEntry> {
        self.entries.get(file_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a table and check every range against the image length
    pub fn from_bytes(bytes: &[u8], image_len: usize) -> Result<Self> {
        if bytes.len() % FAT_ENTRY_SIZE != 0 {
            return Err(NitroError::malformed(format!(
                "FAT size {:#x} is not a multiple of {}",
                bytes.len(),
                FAT_ENTRY_SIZE
            )));
        }

        let mut r = ByteReader::new(bytes);
        let mut entries = Vec::with_capacity(bytes.len() / FAT_ENTRY_SIZE);
        while r.remaining() > 0 {
            let entry = FatEntry::new(r.u32()?, r.u32()?);
            if entry.end < entry.start || entry.end as usize > image_len {
                return Err(NitroError::malformed(format!(
                    "FAT entry {} ({:#x}..{:#x}) outside image of {:#x} bytes",
                    entries.len(),
                    entry.start,
                    entry.end,
                    image_len
                )));
            }
            entries.push(entry);
        }

        Ok(Fat { entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.entries.len() * FAT_ENTRY_SIZE);
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.start.to_le_bytes());
            bytes.extend_from_slice(&entry.end.to_le_bytes());
        }
        bytes
    }

    /// First pair of file ids whose ranges overlap
    pub fn find_overlap(&self) -> Option<(usize, usize)> {
        let mut order: Vec<usize> = (0..self.entries.len())
            .filter(|&id| !self.entries[id].is_empty())
            .collect();
        order.sort_by_key(|&id| self.entries[id].start);

        order
            .windows(2)
            .find(|pair| self.entries[pair[0]].overlaps(&self.entries[pair[1]]))
            .map(|pair| (pair[0], pair[1]))
    }
}
