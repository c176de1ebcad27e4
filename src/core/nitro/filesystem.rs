//! Code segments, overlays and the FAT/FNT file tree
//!
//! On read the image is split into a `system` folder (segments and
//! overlays) and a `data` folder (the name-table tree), all as windows into
//! the image. On write the section between the header and the banner is
//! rebuilt and every file receives its new offset.

use super::arm::{CodeSegment, Processor};
use super::fat::{Fat, FatEntry, FAT_ENTRY_SIZE};
use super::fnt::Fnt;
use super::header::Header;
use super::overlay::OverlayTable;
use super::{DATA_FOLDER, FILE_ALIGNMENT, PADDING_BYTE, SECTION_ALIGNMENT, SYSTEM_FOLDER};
use crate::error::{NitroError, Result};
use crate::io::{align_up, pad_to_alignment, ByteView};
use crate::vfs::{join_path, Folder, GameFile};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Segment and overlay metadata kept between read and write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystem {
    pub arm9: CodeSegment,
    pub arm7: CodeSegment,
    pub overlays9: OverlayTable,
    pub overlays7: OverlayTable,
}

/// Result of laying out the file system for a new image
#[derive(Debug)]
pub struct FileSystemLayout<'a> {
    /// Bytes from the end of the header to the banner, padded
    pub section: Vec<u8>,
    pub banner_offset: u32,
    /// Data files in file id order with their image offsets
    pub files: Vec<(&'a GameFile, u32)>,
    /// End of the last used byte
    pub rom_size: u32,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem {
    pub fn new() -> Self {
        FileSystem {
            arm9: CodeSegment::new(Processor::Arm9),
            arm7: CodeSegment::new(Processor::Arm7),
            overlays9: OverlayTable::new(Processor::Arm9),
            overlays7: OverlayTable::new(Processor::Arm7),
        }
    }

    pub fn segment(&self, processor: Processor) -> &CodeSegment {
        match processor {
            Processor::Arm9 => &self.arm9,
            Processor::Arm7 => &self.arm7,
        }
    }

    pub fn overlays(&self, processor: Processor) -> &OverlayTable {
        match processor {
            Processor::Arm9 => &self.overlays9,
            Processor::Arm7 => &self.overlays7,
        }
    }

    fn overlays_mut(&mut self, processor: Processor) -> &mut OverlayTable {
        match processor {
            Processor::Arm9 => &mut self.overlays9,
            Processor::Arm7 => &mut self.overlays7,
        }
    }

    /// Number of overlays of both processors
    pub fn overlay_count(&self) -> usize {
        self.overlays9.len() + self.overlays7.len()
    }

    /// Split an image into its metadata, data folder and system folder
    pub fn read(image: &ByteView, header: &Header) -> Result<(Self, Folder, Folder)> {
        let fat_bytes = section(image, header.fat_offset, header.fat_size, "FAT")?;
        let fat = Fat::from_bytes(fat_bytes.as_slice(), image.len())?;
        if let Some((a, b)) = fat.find_overlap() {
            warn!("FAT entries {} and {} overlap", a, b);
        }

        let fnt_bytes = section(image, header.fnt_offset, header.fnt_size, "FNT")?;
        let fnt = Fnt::from_bytes(fnt_bytes.as_slice())?;
        let bind = |id: u16| file_window(image, &fat, id as u32);
        let data = fnt.to_folder(DATA_FOLDER, bind)?;

        let mut fs = FileSystem::new();
        let mut system = Folder::new(SYSTEM_FOLDER);
        let mut claimed: HashSet<u32> = fnt.file_ids().map(u32::from).collect();

        for processor in [Processor::Arm9, Processor::Arm7] {
            let (segment, code) = CodeSegment::from_image(image, header, processor)?;
            system.add_file(GameFile::new(processor.segment_file_name(), code));

            let (offset, size) = match processor {
                Processor::Arm9 => (header.ov9_table_offset, header.ov9_table_size),
                Processor::Arm7 => (header.ov7_table_offset, header.ov7_table_size),
            };
            let table_bytes = section(image, offset, size, "overlay table")?;
            let table = OverlayTable::from_bytes(table_bytes.as_slice(), processor)?;

            let mut folder = Folder::new(processor.overlay_folder_name());
            for entry in &table.entries {
                let window = file_window(image, &fat, entry.file_id)?;
                folder.add_file(GameFile::new(entry.file_name(), window));
                claimed.insert(entry.file_id);
            }
            system.add_folder(folder);

            match processor {
                Processor::Arm9 => fs.arm9 = segment,
                Processor::Arm7 => fs.arm7 = segment,
            }
            *fs.overlays_mut(processor) = table;
        }

        let orphans = (0..fat.len() as u32)
            .filter(|id| !claimed.contains(id))
            .count();
        if orphans > 0 {
            warn!("{} FAT entries are not referenced and will be dropped", orphans);
        }

        debug!(
            "Read file system: {} files, {} overlays",
            data.count_files(),
            fs.overlay_count()
        );
        Ok((fs, data, system))
    }

    /// Lay out segments, overlays, FNT and FAT after the header and assign
    /// offsets to every data file placed after a banner of `banner_len`
    /// bytes (already padded).
    ///
    /// Header offsets and sizes are updated in place.
    pub fn write<'a>(
        &mut self,
        header: &mut Header,
        data: &'a Folder,
        system: &Folder,
        banner_len: usize,
    ) -> Result<FileSystemLayout<'a>> {
        let base = header.header_size as usize;
        let mut out = Vec::new();
        let mut fat_entries = Vec::new();
        let mut next_file_id = 0u32;

        for processor in [Processor::Arm9, Processor::Arm7] {
            let code = system_file(system, processor.segment_file_name())?;
            let segment = self.segment(processor).clone();
            let offset = to_u32(base + out.len())?;
            segment.write_into(&mut out, code.data());
            segment.update_header(header, offset, to_u32(code.len())?);
            pad_to_alignment(&mut out, PADDING_BYTE, SECTION_ALIGNMENT);

            let folder_name = processor.overlay_folder_name();
            let folder = system.folder(folder_name);
            let table = self.overlays_mut(processor);
            for entry in table.entries.iter_mut() {
                entry.file_id = next_file_id;
                next_file_id += 1;
            }

            let (table_offset, table_size) = if table.is_empty() {
                (0, 0)
            } else {
                let offset = to_u32(base + out.len())?;
                out.extend_from_slice(&table.to_bytes());
                pad_to_alignment(&mut out, PADDING_BYTE, SECTION_ALIGNMENT);
                (offset, to_u32(table.size())?)
            };

            for entry in table.entries.iter_mut() {
                let name = entry.file_name();
                let file = folder.and_then(|f| f.file(&name)).ok_or_else(|| {
                    NitroError::NotFound(join_path(&join_path(system.path(), folder_name), &name))
                })?;

                entry.write_address = to_u32(base + out.len())?;
                out.extend_from_slice(file.data().as_slice());
                fat_entries.push(FatEntry::new(
                    entry.write_address,
                    to_u32(base + out.len())?,
                ));
                pad_to_alignment(&mut out, PADDING_BYTE, SECTION_ALIGNMENT);
            }

            if let Some(folder) = folder {
                let listed: HashSet<String> = table.entries.iter().map(|e| e.file_name()).collect();
                for extra in folder.files().filter(|f| !listed.contains(f.name())) {
                    warn!("{} has no overlay table entry, skipping", extra.path());
                }
            }

            match processor {
                Processor::Arm9 => {
                    header.ov9_table_offset = table_offset;
                    header.ov9_table_size = table_size;
                }
                Processor::Arm7 => {
                    header.ov7_table_offset = table_offset;
                    header.ov7_table_size = table_size;
                }
            }
        }

        let first_data_id = u16::try_from(next_file_id)
            .map_err(|_| NitroError::malformed("too many overlays"))?;
        let fnt = Fnt::encode(data, first_data_id)?;
        header.fnt_offset = to_u32(base + out.len())?;
        header.fnt_size = to_u32(fnt.bytes.len())?;
        out.extend_from_slice(&fnt.bytes);
        pad_to_alignment(&mut out, PADDING_BYTE, SECTION_ALIGNMENT);

        let file_count = fat_entries.len() + fnt.files.len();
        let fat_offset = base + out.len();
        let fat_size = file_count * FAT_ENTRY_SIZE;
        let banner_offset = align_up(fat_offset + fat_size, SECTION_ALIGNMENT);

        let mut cursor = banner_offset + banner_len;
        let mut rom_end = banner_offset + banner_len;
        let mut files = Vec::with_capacity(fnt.files.len());
        for file in fnt.files {
            let start = cursor;
            let end = start + file.len();
            fat_entries.push(FatEntry::new(to_u32(start)?, to_u32(end)?));
            files.push((file, to_u32(start)?));
            rom_end = end;
            cursor = align_up(end, FILE_ALIGNMENT);
        }

        let fat = Fat::new(fat_entries);
        header.fat_offset = to_u32(fat_offset)?;
        header.fat_size = to_u32(fat_size)?;
        out.extend_from_slice(&fat.to_bytes());
        pad_to_alignment(&mut out, PADDING_BYTE, SECTION_ALIGNMENT);

        header.banner_offset = to_u32(banner_offset)?;
        header.rom_size = to_u32(rom_end)?;

        debug!(
            "Laid out file system: {} files, FNT at {:#x}, FAT at {:#x}, banner at {:#x}",
            file_count, header.fnt_offset, header.fat_offset, banner_offset
        );

        Ok(FileSystemLayout {
            section: out,
            banner_offset: header.banner_offset,
            files,
            rom_size: header.rom_size,
        })
    }
}

fn section(image: &ByteView, offset: u32, size: u32, what: &str) -> Result<ByteView> {
    if size == 0 {
        return Ok(ByteView::empty());
    }
    image
        .slice(offset as usize, size as usize)
        .map_err(|e| NitroError::malformed(format!("{}: {}", what, e)))
}

fn file_window(image: &ByteView, fat: &Fat, file_id: u32) -> Result<ByteView> {
    let entry = fat
        .get(file_id as usize)
        .ok_or_else(|| NitroError::malformed(format!("file id {} has no FAT entry", file_id)))?;
    image.slice(entry.start as usize, entry.len() as usize)
}

fn system_file<'a>(system: &'a Folder, name: &str) -> Result<&'a GameFile> {
    system
        .file(name)
        .ok_or_else(|| NitroError::NotFound(join_path(system.path(), name)))
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| NitroError::malformed(format!("offset {:#x} exceeds 32 bits", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nitro::overlay::OverlayEntry;

    fn system_folder(fs: &mut FileSystem) -> Folder {
        let mut system = Folder::new(SYSTEM_FOLDER);
        system.add_file(GameFile::new("arm9.bin", vec![0x99; 0x300]));
        system.add_file(GameFile::new("arm7.bin", vec![0x77; 0x10]));

        let mut ov9 = Folder::new("overlay9");
        for id in 0..2 {
            let entry = OverlayEntry::new(id);
            ov9.add_file(GameFile::new(entry.file_name(), vec![id as u8; 0x20]));
            fs.overlays9.entries.push(entry);
        }
        system.add_folder(ov9);
        system.add_folder(Folder::new("overlay7"));
        system
    }

    fn data_folder() -> Folder {
        let mut data = Folder::new(DATA_FOLDER);
        data.add_file(GameFile::new("a", vec![0x41; 100]));
        data.add_file(GameFile::new("b", vec![0x42; 200]));
        data
    }

    #[test]
    fn test_layout_offsets() {
        let mut fs = FileSystem::new();
        fs.arm9.unknown_tail = vec![0x21, 0x06];
        let system = system_folder(&mut fs);
        let data = data_folder();
        let mut header = Header::new();

        let layout = fs.write(&mut header, &data, &system, 0xA00).unwrap();

        assert_eq!(header.arm9_offset, 0x4000);
        assert_eq!(header.arm9_size, 0x300);
        assert_eq!(header.ov9_table_offset, 0x4400);
        assert_eq!(header.ov9_table_size, 0x40);
        assert_eq!(fs.overlays9.entries[0].write_address, 0x4600);
        assert_eq!(fs.overlays9.entries[1].write_address, 0x4800);
        assert_eq!(fs.overlays9.entries[1].file_id, 1);
        assert_eq!(header.arm7_offset, 0x4A00);
        assert_eq!((header.ov7_table_offset, header.ov7_table_size), (0, 0));
        assert_eq!(header.fnt_offset, 0x4C00);
        assert_eq!(header.fat_offset, 0x4E00);
        assert_eq!(header.fat_size, 4 * 8);
        assert_eq!(header.banner_offset, 0x5000);

        // Payloads follow the banner, each on its own boundary
        assert_eq!(layout.files[0].1, 0x5A00);
        assert_eq!(layout.files[1].1, 0x5C00);
        assert_eq!(header.rom_size, 0x5C00 + 200);
        assert_eq!(layout.section.len(), 0x5000 - 0x4000);

        // ARM9 tail follows the code
        assert_eq!(&layout.section[0x300..0x302], &[0x21, 0x06]);
        assert_eq!(layout.section[0x302], PADDING_BYTE);
    }

    #[test]
    fn test_fat_order_overlays_first() {
        let mut fs = FileSystem::new();
        let system = system_folder(&mut fs);
        let data = data_folder();
        let mut header = Header::new();
        let layout = fs.write(&mut header, &data, &system, 0xA00).unwrap();

        let start = (header.fat_offset - 0x4000) as usize;
        let fat = Fat::from_bytes(
            &layout.section[start..start + header.fat_size as usize],
            usize::MAX,
        )
        .unwrap();
        assert_eq!(fat.get(0).unwrap(), FatEntry::new(0x4600, 0x4620));
        assert_eq!(fat.get(2).unwrap(), FatEntry::new(0x5A00, 0x5A64));
        assert_eq!(fat.get(3).unwrap(), FatEntry::new(0x5C00, 0x5CC8));
        assert!(fat.find_overlap().is_none());
    }

    #[test]
    fn test_missing_overlay_file() {
        let mut fs = FileSystem::new();
        let mut system = system_folder(&mut fs);
        system
            .folder_mut("overlay9")
            .unwrap()
            .remove("overlay_0001.bin");
        let data = data_folder();
        let mut header = Header::new();

        let err = fs.write(&mut header, &data, &system, 0xA00).unwrap_err();
        assert!(matches!(err, NitroError::NotFound(path) if path == "/system/overlay9/overlay_0001.bin"));
    }

    #[test]
    fn test_missing_segment() {
        let mut fs = FileSystem::new();
        let mut system = system_folder(&mut fs);
        system.remove("arm7.bin");
        let mut header = Header::new();
        assert!(fs
            .write(&mut header, &data_folder(), &system, 0xA00)
            .is_err());
    }
}
