use super::banner::Banner;
use super::filesystem::FileSystem;
use super::header::{Header, MIN_CARTRIDGE_SIZE};
use super::{DATA_FOLDER, PADDING_BYTE, SYSTEM_FOLDER};
use crate::error::{NitroError, Result};
use crate::format::{bool_param, Format, FormatRegistry};
use crate::io::ByteView;
use crate::vfs::{join_path, Folder, GameFile};
use serde_json::Value;
use std::io::Write;
use tracing::{debug, info};

/// Load progress of a cartridge image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RomState {
    Empty,
    HeaderRead,
    BannerRead,
    FilesystemRead,
    Ready,
}

/// Cartridge image codec (`Nitro.ROM`)
///
/// Reading exposes the image as two folders under the ROM file: `data`
/// with the game files and `system` with code segments and overlays.
/// Writing rebuilds the whole image from those folders.
#[derive(Debug)]
pub struct Rom {
    state: RomState,
    header: Header,
    banner: Banner,
    fs: FileSystem,
    update_crc: bool,
}

impl Default for Rom {
    fn default() -> Self {
        Self::new()
    }
}

impl Rom {
    pub const FORMAT_NAME: &'static str = "Nitro.ROM";

    pub fn new() -> Self {
        Rom {
            state: RomState::Empty,
            header: Header::new(),
            banner: Banner::new(1),
            fs: FileSystem::new(),
            update_crc: false,
        }
    }

    /// Build a ROM file from parts instead of reading an image.
    ///
    /// The returned file has no content until it is written.
    pub fn assemble(
        name: &str,
        header: Header,
        banner: Banner,
        fs: FileSystem,
        data: Folder,
        system: Folder,
    ) -> GameFile {
        let rom = Rom {
            state: RomState::Ready,
            header,
            banner,
            fs,
            update_crc: false,
        };

        let mut file = GameFile::new(name, ByteView::empty());
        file.add_folder(data);
        file.add_folder(system);
        file.set_format(Box::new(rom));
        file
    }

    pub fn state(&self) -> RomState {
        self.state
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    pub fn banner_mut(&mut self) -> &mut Banner {
        &mut self.banner
    }

    pub fn filesystem(&self) -> &FileSystem {
        &self.fs
    }

    pub fn filesystem_mut(&mut self) -> &mut FileSystem {
        &mut self.fs
    }

    /// Recompute header and banner checksums on write
    pub fn set_update_crc(&mut self, enabled: bool) {
        self.update_crc = enabled;
    }

    fn load(&mut self, image: &ByteView) -> Result<(Header, Banner, FileSystem, Folder, Folder)> {
        let header = Header::from_bytes(image.as_slice())?;
        self.advance(RomState::HeaderRead);

        let banner_start = header.banner_offset as usize;
        let banner_bytes = image
            .as_slice()
            .get(banner_start..)
            .ok_or_else(|| NitroError::malformed(format!("banner offset {:#x} past end", banner_start)))?;
        let banner = Banner::from_bytes(banner_bytes)?;
        self.advance(RomState::BannerRead);

        let (fs, data, system) = FileSystem::read(image, &header)?;
        self.advance(RomState::FilesystemRead);

        Ok((header, banner, fs, data, system))
    }

    fn advance(&mut self, state: RomState) {
        debug!("ROM state {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

impl Format for Rom {
    fn format_name(&self) -> &str {
        Self::FORMAT_NAME
    }

    fn initialize(&mut self, params: &Value, _registry: &FormatRegistry) -> Result<()> {
        self.update_crc = bool_param(params, "update_crc", false)?;
        Ok(())
    }

    fn read(&mut self, file: &mut GameFile) -> Result<()> {
        self.state = RomState::Empty;
        let image = file.data().clone();

        let (header, banner, fs, data, system) = match self.load(&image) {
            Ok(parts) => parts,
            Err(e) => {
                self.state = RomState::Empty;
                return Err(e);
            }
        };

        info!(
            "Loaded ROM {} ({}, {} bytes, {} files)",
            file.path(),
            header.game_code_str(),
            image.len(),
            data.count_files()
        );

        self.header = header;
        self.banner = banner;
        self.fs = fs;

        let children = file.children_mut();
        children.clear();
        children.add_folder(data);
        children.add_folder(system);
        self.advance(RomState::Ready);
        Ok(())
    }

    fn write(&mut self, file: &GameFile, out: &mut dyn Write) -> Result<()> {
        if self.state != RomState::Ready {
            return Err(NitroError::malformed(format!(
                "ROM {} written in state {:?}",
                file.path(),
                self.state
            )));
        }

        let data = child_folder(file, DATA_FOLDER)?;
        let system = child_folder(file, SYSTEM_FOLDER)?;

        let mut header = self.header.clone();
        if self.update_crc {
            self.banner.update_crc();
        }
        let banner = self.banner.to_padded_bytes();
        let layout = self.fs.write(&mut header, data, system, banner.len())?;

        let needed = u64::from(layout.rom_size);
        if needed > header.cartridge_size() {
            let grown = needed.next_power_of_two().max(MIN_CARTRIDGE_SIZE);
            info!(
                "Growing cartridge capacity from {:#x} to {:#x}",
                header.cartridge_size(),
                grown
            );
            header.set_cartridge_size(grown)?;
        }
        if self.update_crc {
            header.update_crc();
        }

        let header_bytes = header.to_bytes();
        if header_bytes.len() != header.header_size as usize {
            return Err(NitroError::malformed(format!(
                "header encodes to {:#x} bytes but declares {:#x}",
                header_bytes.len(),
                header.header_size
            )));
        }

        let mut out = PositionWriter::new(out);
        out.write_all(&header_bytes)?;
        out.write_all(&layout.section)?;
        out.write_all(&banner)?;
        for (payload, offset) in &layout.files {
            out.fill_to(u64::from(*offset))?;
            out.write_all(payload.data().as_slice())?;
        }
        out.fill_to(header.cartridge_size())?;
        out.flush()?;

        info!(
            "Wrote ROM {} ({} files, {:#x} used of {:#x})",
            file.path(),
            layout.files.len(),
            layout.rom_size,
            header.cartridge_size()
        );

        self.header = header;
        Ok(())
    }
}

fn child_folder<'a>(file: &'a GameFile, name: &str) -> Result<&'a Folder> {
    file.children()
        .folder(name)
        .ok_or_else(|| NitroError::NotFound(join_path(file.path(), name)))
}

/// Sink that tracks how many bytes went through it
struct PositionWriter<'a> {
    inner: &'a mut dyn Write,
    position: u64,
}

impl<'a> PositionWriter<'a> {
    fn new(inner: &'a mut dyn Write) -> Self {
        PositionWriter { inner, position: 0 }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Pad with the fill byte up to `target`
    fn fill_to(&mut self, target: u64) -> Result<()> {
        const CHUNK: [u8; 0x1000] = [PADDING_BYTE; 0x1000];
        if target < self.position {
            return Err(NitroError::malformed(format!(
                "payload at {:#x} overlaps previous data ending at {:#x}",
                target, self.position
            )));
        }
        while self.position < target {
            let len = (target - self.position).min(CHUNK.len() as u64) as usize;
            self.write_all(&CHUNK[..len])?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
