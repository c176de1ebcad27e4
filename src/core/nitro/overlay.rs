//! Overlay tables: 32-byte records describing relocatable code modules

use super::arm::Processor;
use super::overlay_file_name;
use crate::error::{NitroError, Result};
use crate::io::ByteReader;

pub const OVERLAY_ENTRY_SIZE: usize = 0x20;

const ENCODED_SIZE_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub overlay_id: u32,
    pub ram_address: u32,
    pub ram_size: u32,
    pub bss_size: u32,
    pub static_init_start: u32,
    pub static_init_end: u32,
    /// File id of the payload; reassigned on write
    pub file_id: u32,
    /// Compressed size (low 24 bits of the encoding word)
    pub encoded_size: u32,
    /// High byte of the encoding word; bit 0 marks a compressed overlay
    pub flags: u8,
    /// Image offset of the payload, set while the image is written
    pub write_address: u32,
}

impl OverlayEntry {
    pub fn new(overlay_id: u32) -> Self {
        OverlayEntry {
            overlay_id,
            ram_address: 0,
            ram_size: 0,
            bss_size: 0,
            static_init_start: 0,
            static_init_end: 0,
            file_id: 0,
            encoded_size: 0,
            flags: 0,
            write_address: 0,
        }
    }

    pub fn is_encoded(&self) -> bool {
        self.flags & 1 != 0
    }

    pub fn set_encoded(&mut self, encoded: bool) {
        if encoded {
            self.flags |= 1;
        } else {
            self.flags &= !1;
        }
    }

    /// Name of the payload file in the overlay folder
    pub fn file_name(&self) -> String {
        overlay_file_name(self.overlay_id)
    }

    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let mut entry = OverlayEntry::new(r.u32()?);
        entry.ram_address = r.u32()?;
        entry.ram_size = r.u32()?;
        entry.bss_size = r.u32()?;
        entry.static_init_start = r.u32()?;
        entry.static_init_end = r.u32()?;
        entry.file_id = r.u32()?;

        let encoding = r.u32()?;
        entry.encoded_size = encoding & ENCODED_SIZE_MASK;
        entry.flags = (encoding >> 24) as u8;
        Ok(entry)
    }

    pub fn to_bytes(&self) -> [u8; OVERLAY_ENTRY_SIZE] {
        let encoding = (self.encoded_size & ENCODED_SIZE_MASK) | ((self.flags as u32) << 24);
        let mut out = [0u8; OVERLAY_ENTRY_SIZE];
        for (slot, value) in out.chunks_exact_mut(4).zip([
            self.overlay_id,
            self.ram_address,
            self.ram_size,
            self.bss_size,
            self.static_init_start,
            self.static_init_end,
            self.file_id,
            encoding,
        ]) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

/// Overlay table of one processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayTable {
    pub processor: Processor,
    pub entries: Vec<OverlayEntry>,
}

impl OverlayTable {
    pub fn new(processor: Processor) -> Self {
        OverlayTable {
            processor,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded table size in bytes
    pub fn size(&self) -> usize {
        self.entries.len() * OVERLAY_ENTRY_SIZE
    }

    pub fn from_bytes(bytes: &[u8], processor: Processor) -> Result<Self> {
        if bytes.len() % OVERLAY_ENTRY_SIZE != 0 {
            return Err(NitroError::malformed(format!(
                "{:?} overlay table size {:#x} is not a multiple of {:#x}",
                processor,
                bytes.len(),
                OVERLAY_ENTRY_SIZE
            )));
        }

        let mut r = ByteReader::new(bytes);
        let mut entries: Vec<OverlayEntry> = Vec::with_capacity(bytes.len() / OVERLAY_ENTRY_SIZE);
        while r.remaining() > 0 {
            let entry = OverlayEntry::read(&mut r)?;
            if entries.iter().any(|e| e.overlay_id == entry.overlay_id) {
                return Err(NitroError::malformed(format!(
                    "{:?} overlay id {} listed twice",
                    processor, entry.overlay_id
                )));
            }
            entries.push(entry);
        }

        Ok(OverlayTable { processor, entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> OverlayEntry {
        let mut entry = OverlayEntry::new(3);
        entry.ram_address = 0x0210_0000;
        entry.ram_size = 0x1800;
        entry.bss_size = 0x40;
        entry.static_init_start = 0x0210_17C0;
        entry.static_init_end = 0x0210_17C4;
        entry.file_id = 7;
        entry.encoded_size = 0x12_3456;
        entry.flags = 0x03;
        entry
    }

    #[test]
    fn test_record_layout() {
        let bytes = sample_entry().to_bytes();
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
        assert_eq!(&bytes[0x18..0x1C], &7u32.to_le_bytes());
        assert_eq!(&bytes[0x1C..0x20], &0x0312_3456u32.to_le_bytes());
    }

    #[test]
    fn test_table_roundtrip_keeps_flag_bits() {
        let mut table = OverlayTable::new(Processor::Arm9);
        table.entries.push(sample_entry());
        table.entries.push(OverlayEntry::new(4));

        let parsed = OverlayTable::from_bytes(&table.to_bytes(), Processor::Arm9).unwrap();
        assert_eq!(parsed, table);
        assert!(parsed.entries[0].is_encoded());
        assert_eq!(parsed.entries[0].flags, 0x03);
        assert_eq!(parsed.entries[1].file_name(), "overlay_0004.bin");
    }

    #[test]
    fn test_set_encoded() {
        let mut entry = sample_entry();
        entry.set_encoded(false);
        assert!(!entry.is_encoded());
        assert_eq!(entry.flags, 0x02);
    }

    #[test]
    fn test_bad_table_size() {
        assert!(OverlayTable::from_bytes(&[0; 0x30], Processor::Arm7).is_err());
    }

    #[test]
    fn test_duplicate_overlay_id() {
        let mut table = OverlayTable::new(Processor::Arm9);
        table.entries.push(OverlayEntry::new(1));
        table.entries.push(OverlayEntry::new(1));
        assert!(OverlayTable::from_bytes(&table.to_bytes(), Processor::Arm9).is_err());
    }
}
