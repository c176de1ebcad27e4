//! Nitro cartridge image engine
//!
//! ```text
//! Header          0x0000 - header_size
//! ARM9            code + unknown tail
//!   overlay table 0x20 bytes per overlay
//!   overlays
//! ARM7            code
//!   overlay table
//!   overlays
//! FNT             main table + name subtables
//! FAT             (start, end) per file id
//! Banner          icon, palette, localized titles
//! Files           payloads in file id order
//! Padding         0xFF up to the cartridge capacity
//! ```
//!
//! Every section starts on a 0x200 boundary.

pub mod arm;
pub mod banner;
pub mod fat;
pub mod filesystem;
pub mod fnt;
pub mod header;
pub mod overlay;
pub mod rom;

pub use arm::{CodeSegment, Processor};
pub use banner::{Banner, Language};
pub use fat::{Fat, FatEntry};
pub use filesystem::FileSystem;
pub use fnt::{EncodedFnt, Fnt};
pub use header::Header;
pub use overlay::{OverlayEntry, OverlayTable};
pub use rom::{Rom, RomState};

/// Fill byte between and after sections
pub const PADDING_BYTE: u8 = 0xFF;

/// Alignment of every major section
pub const SECTION_ALIGNMENT: usize = 0x200;

/// Alignment of each file payload in the data region
pub const FILE_ALIGNMENT: usize = 0x200;

/// Name of the folder holding the game file tree
pub const DATA_FOLDER: &str = "data";

/// Name of the folder holding code segments and overlays
pub const SYSTEM_FOLDER: &str = "system";

pub const OVERLAY9_FOLDER: &str = "overlay9";
pub const OVERLAY7_FOLDER: &str = "overlay7";

/// File name used for an overlay in the system folder
pub fn overlay_file_name(overlay_id: u32) -> String {
    format!("overlay_{:04}.bin", overlay_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_file_name() {
        assert_eq!(overlay_file_name(0), "overlay_0000.bin");
        assert_eq!(overlay_file_name(42), "overlay_0042.bin");
        assert_eq!(overlay_file_name(12345), "overlay_12345.bin");
    }
}
