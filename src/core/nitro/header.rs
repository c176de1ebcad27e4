//! Cartridge header

use crate::checksum::crc16;
use crate::error::{NitroError, Result};
use crate::io::ByteReader;

/// Bytes occupied by the parsed header fields
pub const HEADER_FIELDS_SIZE: usize = 0x170;

/// Header size used by retail cartridges
pub const DEFAULT_HEADER_SIZE: u32 = 0x4000;

/// Offset of the header CRC; the checksum covers everything before it
pub const HEADER_CRC_OFFSET: usize = 0x15E;

/// Capacity is stored as `log2(size) - 17`
pub const MIN_CARTRIDGE_SHIFT: u32 = 17;

/// Smallest valid cartridge capacity (128 KiB)
pub const MIN_CARTRIDGE_SIZE: u64 = 1 << MIN_CARTRIDGE_SHIFT;

/// Cartridge header
///
/// Fixed little-endian field block followed by an opaque tail that fills
/// the header up to `header_size`. Section offsets and sizes are rewritten
/// when the image is rebuilt; everything else round-trips untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Game title, NUL padded (0x000)
    pub title: [u8; 12],
    /// Four character game code (0x00C)
    pub game_code: [u8; 4],
    /// Two character maker code (0x010)
    pub maker_code: [u8; 2],
    pub unit_code: u8,
    pub encryption_seed: u8,
    /// Capacity in bytes, always a power of two (0x014)
    cartridge_size: u64,
    pub reserved: [u8; 9],
    pub rom_version: u8,
    pub internal_flags: u8,

    /// ARM9 segment (0x020)
    pub arm9_offset: u32,
    pub arm9_entry_address: u32,
    pub arm9_ram_address: u32,
    pub arm9_size: u32,

    /// ARM7 segment (0x030)
    pub arm7_offset: u32,
    pub arm7_entry_address: u32,
    pub arm7_ram_address: u32,
    pub arm7_size: u32,

    /// File name and allocation tables (0x040)
    pub fnt_offset: u32,
    pub fnt_size: u32,
    pub fat_offset: u32,
    pub fat_size: u32,

    /// Overlay tables (0x050)
    pub ov9_table_offset: u32,
    pub ov9_table_size: u32,
    pub ov7_table_offset: u32,
    pub ov7_table_size: u32,

    /// Card control register settings (0x060)
    pub flags_read: u32,
    pub flags_init: u32,
    pub banner_offset: u32,
    pub secure_crc16: u16,
    pub rom_timeout: u16,
    pub arm9_autoload: u32,
    pub arm7_autoload: u32,
    pub secure_disable: u64,

    /// Used image size, excluding padding (0x080)
    pub rom_size: u32,
    pub header_size: u32,
    pub reserved2: [u8; 56],
    pub logo: [u8; 156],
    pub logo_crc16: u16,
    pub header_crc16: u16,

    /// Debug build fields (0x160)
    pub debug_rom_offset: u32,
    pub debug_size: u32,
    pub debug_ram_address: u32,
    pub reserved3: u32,

    /// Bytes between the field block and `header_size`, kept verbatim
    pub unknown_tail: Vec<u8>,
}

impl Header {
    /// Blank header for a 128 KiB cartridge with the retail header size
    pub fn new() -> Self {
        Header {
            title: [0; 12],
            game_code: [0; 4],
            maker_code: [0; 2],
            unit_code: 0,
            encryption_seed: 0,
            cartridge_size: MIN_CARTRIDGE_SIZE,
            reserved: [0; 9],
            rom_version: 0,
            internal_flags: 0,
            arm9_offset: 0,
            arm9_entry_address: 0,
            arm9_ram_address: 0,
            arm9_size: 0,
            arm7_offset: 0,
            arm7_entry_address: 0,
            arm7_ram_address: 0,
            arm7_size: 0,
            fnt_offset: 0,
            fnt_size: 0,
            fat_offset: 0,
            fat_size: 0,
            ov9_table_offset: 0,
            ov9_table_size: 0,
            ov7_table_offset: 0,
            ov7_table_size: 0,
            flags_read: 0,
            flags_init: 0,
            banner_offset: 0,
            secure_crc16: 0,
            rom_timeout: 0,
            arm9_autoload: 0,
            arm7_autoload: 0,
            secure_disable: 0,
            rom_size: 0,
            header_size: DEFAULT_HEADER_SIZE,
            reserved2: [0; 56],
            logo: [0; 156],
            logo_crc16: 0,
            header_crc16: 0,
            debug_rom_offset: 0,
            debug_size: 0,
            debug_ram_address: 0,
            reserved3: 0,
            unknown_tail: vec![0; DEFAULT_HEADER_SIZE as usize - HEADER_FIELDS_SIZE],
        }
    }

    /// Capacity of the cartridge in bytes
    pub fn cartridge_size(&self) -> u64 {
        self.cartridge_size
    }

    /// Set the capacity; must be a power of two of at least 128 KiB
    pub fn set_cartridge_size(&mut self, size: u64) -> Result<()> {
        if !size.is_power_of_two() || size < MIN_CARTRIDGE_SIZE {
            return Err(NitroError::InvalidCartridgeSize(size));
        }
        self.cartridge_size = size;
        Ok(())
    }

    /// Stored capacity exponent
    pub fn capacity_exponent(&self) -> u8 {
        (self.cartridge_size.trailing_zeros() - MIN_CARTRIDGE_SHIFT) as u8
    }

    /// Title with NUL padding removed
    pub fn title_str(&self) -> String {
        trim_nul(&self.title)
    }

    pub fn game_code_str(&self) -> String {
        trim_nul(&self.game_code)
    }

    pub fn maker_code_str(&self) -> String {
        trim_nul(&self.maker_code)
    }

    /// Store a title, truncated to 12 bytes and NUL padded
    pub fn set_title(&mut self, title: &str) {
        self.title = [0; 12];
        let bytes = title.as_bytes();
        let len = bytes.len().min(self.title.len());
        self.title[..len].copy_from_slice(&bytes[..len]);
    }

    /// Parse a header from the start of an image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_FIELDS_SIZE {
            return Err(NitroError::malformed(format!(
                "header needs {:#x} bytes, image has {:#x}",
                HEADER_FIELDS_SIZE,
                bytes.len()
            )));
        }

        let mut r = ByteReader::new(bytes);
        let mut header = Header::new();

        header.title = r.array()?;
        header.game_code = r.array()?;
        header.maker_code = r.array()?;
        header.unit_code = r.u8()?;
        header.encryption_seed = r.u8()?;

        let exponent = r.u8()? as u32;
        let shift = MIN_CARTRIDGE_SHIFT + exponent;
        if shift > 63 {
            return Err(NitroError::malformed(format!(
                "cartridge capacity exponent {} out of range",
                exponent
            )));
        }
        header.cartridge_size = 1u64 << shift;

        header.reserved = r.array()?;
        header.rom_version = r.u8()?;
        header.internal_flags = r.u8()?;

        header.arm9_offset = r.u32()?;
        header.arm9_entry_address = r.u32()?;
        header.arm9_ram_address = r.u32()?;
        header.arm9_size = r.u32()?;
        header.arm7_offset = r.u32()?;
        header.arm7_entry_address = r.u32()?;
        header.arm7_ram_address = r.u32()?;
        header.arm7_size = r.u32()?;

        header.fnt_offset = r.u32()?;
        header.fnt_size = r.u32()?;
        header.fat_offset = r.u32()?;
        header.fat_size = r.u32()?;
        header.ov9_table_offset = r.u32()?;
        header.ov9_table_size = r.u32()?;
        header.ov7_table_offset = r.u32()?;
        header.ov7_table_size = r.u32()?;

        header.flags_read = r.u32()?;
        header.flags_init = r.u32()?;
        header.banner_offset = r.u32()?;
        header.secure_crc16 = r.u16()?;
        header.rom_timeout = r.u16()?;
        header.arm9_autoload = r.u32()?;
        header.arm7_autoload = r.u32()?;
        header.secure_disable = r.u64()?;
        header.rom_size = r.u32()?;
        header.header_size = r.u32()?;
        header.reserved2 = r.array()?;
        header.logo = r.array()?;
        header.logo_crc16 = r.u16()?;
        header.header_crc16 = r.u16()?;
        header.debug_rom_offset = r.u32()?;
        header.debug_size = r.u32()?;
        header.debug_ram_address = r.u32()?;
        header.reserved3 = r.u32()?;

        let consumed = r.position();
        let header_size = header.header_size as usize;
        if header_size < consumed {
            return Err(NitroError::malformed(format!(
                "header size {:#x} smaller than its fields ({:#x})",
                header_size, consumed
            )));
        }
        header.unknown_tail = r.bytes(header_size - consumed)?.to_vec();

        Ok(header)
    }

    /// Serialize the fields and the unknown tail
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_FIELDS_SIZE + self.unknown_tail.len());

        bytes.extend_from_slice(&self.title);
        bytes.extend_from_slice(&self.game_code);
        bytes.extend_from_slice(&self.maker_code);
        bytes.push(self.unit_code);
        bytes.push(self.encryption_seed);
        bytes.push(self.capacity_exponent());
        bytes.extend_from_slice(&self.reserved);
        bytes.push(self.rom_version);
        bytes.push(self.internal_flags);

        for value in [
            self.arm9_offset,
            self.arm9_entry_address,
            self.arm9_ram_address,
            self.arm9_size,
            self.arm7_offset,
            self.arm7_entry_address,
            self.arm7_ram_address,
            self.arm7_size,
            self.fnt_offset,
            self.fnt_size,
            self.fat_offset,
            self.fat_size,
            self.ov9_table_offset,
            self.ov9_table_size,
            self.ov7_table_offset,
            self.ov7_table_size,
            self.flags_read,
            self.flags_init,
            self.banner_offset,
        ] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        bytes.extend_from_slice(&self.secure_crc16.to_le_bytes());
        bytes.extend_from_slice(&self.rom_timeout.to_le_bytes());
        bytes.extend_from_slice(&self.arm9_autoload.to_le_bytes());
        bytes.extend_from_slice(&self.arm7_autoload.to_le_bytes());
        bytes.extend_from_slice(&self.secure_disable.to_le_bytes());
        bytes.extend_from_slice(&self.rom_size.to_le_bytes());
        bytes.extend_from_slice(&self.header_size.to_le_bytes());
        bytes.extend_from_slice(&self.reserved2);
        bytes.extend_from_slice(&self.logo);
        bytes.extend_from_slice(&self.logo_crc16.to_le_bytes());
        bytes.extend_from_slice(&self.header_crc16.to_le_bytes());
        bytes.extend_from_slice(&self.debug_rom_offset.to_le_bytes());
        bytes.extend_from_slice(&self.debug_size.to_le_bytes());
        bytes.extend_from_slice(&self.debug_ram_address.to_le_bytes());
        bytes.extend_from_slice(&self.reserved3.to_le_bytes());

        bytes.extend_from_slice(&self.unknown_tail);
        bytes
    }

    /// Recompute the header CRC over `[0, 0x15E)`. The logo CRC is left
    /// alone.
    pub fn update_crc(&mut self) {
        let bytes = self.to_bytes();
        self.header_crc16 = crc16(&bytes[..HEADER_CRC_OFFSET]);
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
