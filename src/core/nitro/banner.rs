//! Icon and title banner
//!
//! Versions 1, 2, 3 and 0x103 differ in how many titles and CRC slots they
//! carry. Output is padded to the section alignment.

use super::{PADDING_BYTE, SECTION_ALIGNMENT};
use crate::checksum::crc16;
use crate::error::{NitroError, Result};
use crate::io::{pad_to_alignment, ByteReader};
use tracing::warn;

pub const ICON_SIZE: usize = 0x200;
pub const PALETTE_SIZE: usize = 0x20;
pub const TITLE_SIZE: usize = 0x100;

/// Offset of the first title block
const TITLES_OFFSET: usize = 0x240;

/// Version carrying the animated icon block
pub const VERSION_ANIMATED: u16 = 0x103;

/// Checksummed ranges, one per CRC slot
const CRC_RANGES: [(usize, usize); 4] = [
    (0x20, 0x840),
    (0x20, 0x940),
    (0x20, 0xA40),
    (0x1240, 0x23C0),
];

/// Title languages in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Japanese,
    English,
    French,
    German,
    Italian,
    Spanish,
    /// Version 2 and later
    Chinese,
    /// Version 3 and later
    Korean,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Japanese,
        Language::English,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Spanish,
        Language::Chinese,
        Language::Korean,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Icon and localized titles shown by the system menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub version: u16,
    /// CRC slots at 0x02, 0x04, 0x06 and 0x08; unused slots are kept as read
    pub crcs: [u16; 4],
    pub reserved: [u8; 0x16],
    pub icon: [u8; ICON_SIZE],
    pub palette: [u8; PALETTE_SIZE],
    /// Raw UTF-16LE title blocks, six to eight depending on the version
    pub titles: Vec<[u8; TITLE_SIZE]>,
    /// Bytes past the last title (animated icon data)
    pub extra: Vec<u8>,
}

impl Banner {
    /// Blank banner of the given version
    pub fn new(version: u16) -> Self {
        let titles = title_count(version);
        let extra = data_size(version) - TITLES_OFFSET - titles * TITLE_SIZE;

        Banner {
            version,
            crcs: [0; 4],
            reserved: [0; 0x16],
            icon: [0; ICON_SIZE],
            palette: [0; PALETTE_SIZE],
            titles: vec![[0; TITLE_SIZE]; titles],
            extra: vec![0; extra],
        }
    }

    /// Serialized size without padding
    pub fn size(&self) -> usize {
        data_size(self.version)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let version = r.u16()?;
        if !matches!(version, 1 | 2 | 3 | VERSION_ANIMATED) {
            warn!("Unknown banner version {:#x}, reading as version 1", version);
        }

        let mut banner = Banner::new(version);
        for crc in banner.crcs.iter_mut() {
            *crc = r.u16()?;
        }
        banner.reserved = r.array()?;
        banner.icon = r.array()?;
        banner.palette = r.array()?;
        for title in banner.titles.iter_mut() {
            *title = r.array()?;
        }
        let extra_len = banner.extra.len();
        banner.extra = r.bytes(extra_len)?.to_vec();

        Ok(banner)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        for crc in &self.crcs {
            bytes.extend_from_slice(&crc.to_le_bytes());
        }
        bytes.extend_from_slice(&self.reserved);
        bytes.extend_from_slice(&self.icon);
        bytes.extend_from_slice(&self.palette);
        for title in &self.titles {
            bytes.extend_from_slice(title);
        }
        bytes.extend_from_slice(&self.extra);
        bytes
    }

    /// Serialized bytes padded to the section alignment
    pub fn to_padded_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_bytes();
        pad_to_alignment(&mut bytes, PADDING_BYTE, SECTION_ALIGNMENT);
        bytes
    }

    /// Decoded title, `None` when this version has no slot for `lang`
    pub fn title(&self, lang: Language) -> Option<String> {
        let raw = self.titles.get(lang.index())?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        Some(String::from_utf16_lossy(&units))
    }

    /// Store a title as UTF-16LE, truncated to the slot and NUL padded
    pub fn set_title(&mut self, lang: Language, title: &str) -> Result<()> {
        let version = self.version;
        let raw = self.titles.get_mut(lang.index()).ok_or_else(|| {
            NitroError::InvalidSpec(format!(
                "banner version {:#x} has no {:?} title",
                version, lang
            ))
        })?;

        *raw = [0; TITLE_SIZE];
        for (slot, unit) in raw.chunks_exact_mut(2).zip(title.encode_utf16()) {
            slot.copy_from_slice(&unit.to_le_bytes());
        }
        Ok(())
    }

    /// Recompute the CRC of every range this version carries
    pub fn update_crc(&mut self) {
        let bytes = self.to_bytes();
        for (slot, &(start, end)) in CRC_RANGES.iter().enumerate() {
            if end <= bytes.len() && crc_slots(self.version) > slot {
                self.crcs[slot] = crc16(&bytes[start..end]);
            }
        }
    }
}

fn title_count(version: u16) -> usize {
    match version {
        2 => 7,
        3 | VERSION_ANIMATED => 8,
        _ => 6,
    }
}

fn data_size(version: u16) -> usize {
    match version {
        2 => 0x940,
        3 => 0xA40,
        VERSION_ANIMATED => 0x23C0,
        _ => 0x840,
    }
}

fn crc_slots(version: u16) -> usize {
    match version {
        2 => 2,
        3 => 3,
        VERSION_ANIMATED => 4,
        _ => 1,
    }
}
