//! ARM9 and ARM7 code segments
//!
//! Each segment is a blob plus the load and entry addresses the header
//! stores for it. ARM9 may be followed by a short tail that is kept
//! verbatim.

use super::header::Header;
use super::PADDING_BYTE;
use crate::error::{NitroError, Result};
use crate::io::ByteView;
use tracing::debug;

/// Which processor a code segment or overlay belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Processor {
    Arm9,
    Arm7,
}

impl Processor {
    /// File name of the segment in the system folder
    pub fn segment_file_name(self) -> &'static str {
        match self {
            Processor::Arm9 => "arm9.bin",
            Processor::Arm7 => "arm7.bin",
        }
    }

    /// Folder holding this processor's overlays
    pub fn overlay_folder_name(self) -> &'static str {
        match self {
            Processor::Arm9 => super::OVERLAY9_FOLDER,
            Processor::Arm7 => super::OVERLAY7_FOLDER,
        }
    }
}

/// Load metadata of one executable image.
///
/// The code itself lives in the system folder file named after the
/// processor; this carries what the header says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSegment {
    pub processor: Processor,
    pub entry_address: u32,
    pub autoload_address: u32,
    pub ram_address: u32,
    /// Opaque bytes after the ARM9 code up to the padding byte
    pub unknown_tail: Vec<u8>,
}

impl CodeSegment {
    pub fn new(processor: Processor) -> Self {
        CodeSegment {
            processor,
            entry_address: 0,
            autoload_address: 0,
            ram_address: 0,
            unknown_tail: Vec::new(),
        }
    }

    /// Read a segment described by `header`.
    ///
    /// Returns the metadata and a window over the code. For the ARM9 the
    /// bytes following the code are collected as the unknown tail until
    /// the padding byte, the start of the next known section or the end of
    /// the image.
    pub fn from_image(
        image: &ByteView,
        header: &Header,
        processor: Processor,
    ) -> Result<(Self, ByteView)> {
        let (offset, size, entry, ram, autoload) = match processor {
            Processor::Arm9 => (
                header.arm9_offset,
                header.arm9_size,
                header.arm9_entry_address,
                header.arm9_ram_address,
                header.arm9_autoload,
            ),
            Processor::Arm7 => (
                header.arm7_offset,
                header.arm7_size,
                header.arm7_entry_address,
                header.arm7_ram_address,
                header.arm7_autoload,
            ),
        };

        let code = image
            .slice(offset as usize, size as usize)
            .map_err(|e| NitroError::malformed(format!("{:?} segment: {}", processor, e)))?;

        let mut segment = CodeSegment {
            processor,
            entry_address: entry,
            autoload_address: autoload,
            ram_address: ram,
            unknown_tail: Vec::new(),
        };

        if processor == Processor::Arm9 {
            let start = offset as usize + size as usize;
            let limit = next_section_start(header, start).unwrap_or(image.len());
            let window = &image.as_slice()[start.min(image.len())..limit.min(image.len())];
            let len = window
                .iter()
                .position(|&b| b == PADDING_BYTE)
                .unwrap_or(window.len());
            segment.unknown_tail = window[..len].to_vec();
            debug!("ARM9 tail: {} bytes", len);
        }

        Ok((segment, code))
    }

    /// Record the segment's new placement in the header
    pub fn update_header(&self, header: &mut Header, offset: u32, size: u32) {
        let offset = if size > 0 { offset } else { 0 };
        match self.processor {
            Processor::Arm9 => {
                header.arm9_offset = offset;
                header.arm9_size = size;
                header.arm9_entry_address = self.entry_address;
                header.arm9_ram_address = self.ram_address;
                header.arm9_autoload = self.autoload_address;
            }
            Processor::Arm7 => {
                header.arm7_offset = offset;
                header.arm7_size = size;
                header.arm7_entry_address = self.entry_address;
                header.arm7_ram_address = self.ram_address;
                header.arm7_autoload = self.autoload_address;
            }
        }
    }

    /// Bytes written for this segment: code then tail
    pub fn encoded_len(&self, code: &ByteView) -> usize {
        code.len() + self.unknown_tail.len()
    }

    pub fn write_into(&self, out: &mut Vec<u8>, code: &ByteView) {
        out.extend_from_slice(code.as_slice());
        out.extend_from_slice(&self.unknown_tail);
    }
}

/// Closest declared section start after `from`
fn next_section_start(header: &Header, from: usize) -> Option<usize> {
    [
        header.ov9_table_offset,
        header.arm7_offset,
        header.ov7_table_offset,
        header.fnt_offset,
        header.fat_offset,
        header.banner_offset,
    ]
    .into_iter()
    .map(|offset| offset as usize)
    .filter(|&offset| offset >= from && offset != 0)
    .min()
}
