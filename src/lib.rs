//! # nitro-modkit - Nitro cartridge image toolkit
//!
//! `nitro-modkit` unpacks a Nitro cartridge image into a virtual
//! filesystem, lets per-file codecs translate entries to and from editable
//! files, and rebuilds an equivalent image:
//!
//! - **Byte-exact rebuilding** of header, code segments, overlay tables,
//!   FNT, FAT and banner
//! - **Zero-copy loading**: files are windows into a memory-mapped image
//! - **Codecs** bound by name through a [`FormatRegistry`]
//! - **Dependency-ordered writes** driven by a project specification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nitro_modkit::{RomImage, Result};
//!
//! # fn main() -> Result<()> {
//! let mut rom = RomImage::open("game.nds")?;
//!
//! // Files of the data folder
//! for entry in rom.list("data")? {
//!     println!("{} ({:?} bytes)", entry.path, entry.size);
//! }
//!
//! // Replace one file and rebuild
//! rom.write("data/script/s01.bin", vec![0u8; 0x400])?;
//! rom.save("patched.nds")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Batch Usage
//!
//! ```rust,no_run
//! use nitro_modkit::{
//!     EditSpec, FormatRegistry, GameFile, ImportFilter, Node, ProjectSpec, Result, Worker,
//! };
//! use nitro_modkit::io::ByteView;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<()> {
//! let image = GameFile::new("game.nds", ByteView::open("game.nds")?);
//! let mut worker = Worker::new(
//!     Node::File(image),
//!     ProjectSpec::load("project.toml")?,
//!     EditSpec::load("edit.toml")?,
//!     FormatRegistry::with_builtin(),
//! )?;
//!
//! let report = worker.import_batch(&ImportFilter::All)?;
//! println!("{} imported, {} skipped", report.processed.len(), report.skipped.len());
//! worker.write(&[PathBuf::from("patched.nds")])?;
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use core::{
    checksum, edit, error, format, nitro, project, scheduler, validation, vfs, worker,
};

pub use crate::core::io;

// Re-export core types that users need
pub use crate::core::{
    edit::{EditSpec, FileEdit, Variable},
    error::{Direction, NitroError, Result},
    format::{Format, FormatRegistry, MultiType, Replace},
    nitro::{Banner, Header, Rom, RomState},
    project::{FileSpec, ProjectSpec},
    scheduler::{DependencySource, UpdateQueue},
    vfs::{Folder, GameFile, Node, NodeRef},
    worker::{BatchReport, ImportFilter, Worker},
};

use crate::core::io::ByteView;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// A file or folder inside a loaded image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Full virtual path (e.g. "/game.nds/data/script/s01.bin")
    pub path: String,

    /// Just the name (e.g. "s01.bin")
    pub name: String,

    /// True for folders
    pub is_dir: bool,

    /// Size in bytes (None for folders)
    pub size: Option<u64>,
}

impl Entry {
    fn from_node(node: &Node) -> Self {
        match node {
            Node::Folder(folder) => Entry {
                path: folder.path().to_string(),
                name: folder.name().to_string(),
                is_dir: true,
                size: None,
            },
            Node::File(file) => Entry {
                path: file.path().to_string(),
                name: file.name().to_string(),
                is_dir: false,
                size: Some(file.len() as u64),
            },
        }
    }
}

/// Load an image file and unpack it with the `Nitro.ROM` codec
pub fn open_rom<P: AsRef<Path>>(path: P) -> Result<GameFile> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rom.nds".to_string());

    info!("Opening image {:?}", path);
    let mut file = GameFile::new(name, ByteView::open(path)?).with_format(Box::new(Rom::new()));
    file.read_format()?;
    Ok(file)
}

/// Encode a loaded image straight into a file on disk
pub fn save_rom<P: AsRef<Path>>(rom: &mut GameFile, path: P) -> Result<()> {
    info!("Saving {} to {:?}", rom.path(), path.as_ref());
    let mut out = BufWriter::new(File::create(path)?);
    rom.write_format_to(&mut out)?;
    out.flush()?;
    Ok(())
}

/// High-level access to one cartridge image
///
/// Paths are relative to the image (`data/...`, `system/arm9.bin`); a
/// leading `/` is accepted as well.
///
/// # Examples
///
/// ```rust,no_run
/// use nitro_modkit::RomImage;
///
/// let rom = RomImage::open("game.nds")?;
/// let arm9 = rom.read("system/arm9.bin")?;
/// println!("ARM9: {} bytes", arm9.len());
/// # Ok::<(), nitro_modkit::NitroError>(())
/// ```
pub struct RomImage {
    file: GameFile,
}

impl RomImage {
    /// Open and unpack an image from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(RomImage {
            file: open_rom(path)?,
        })
    }

    /// Unpack an image held in memory
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Self> {
        let mut file = GameFile::new(name, bytes).with_format(Box::new(Rom::new()));
        file.read_format()?;
        Ok(RomImage { file })
    }

    /// Wrap an already unpacked image file
    pub fn from_file(file: GameFile) -> Self {
        RomImage { file }
    }

    pub fn inner(&self) -> &GameFile {
        &self.file
    }

    pub fn inner_mut(&mut self) -> &mut GameFile {
        &mut self.file
    }

    pub fn into_inner(self) -> GameFile {
        self.file
    }

    /// Content of a file
    pub fn read<P: AsRef<str>>(&self, path: P) -> Result<Vec<u8>> {
        let path = path.as_ref();
        debug!("Reading {}", path);
        self.file
            .search_file(path.trim_start_matches('/'))
            .map(|f| f.data().as_slice().to_vec())
            .ok_or_else(|| NitroError::NotFound(path.to_string()))
    }

    /// Replace the content of an existing file
    pub fn write<P: AsRef<str>>(&mut self, path: P, content: Vec<u8>) -> Result<()> {
        let path = path.as_ref();
        debug!("Writing {} bytes to {}", content.len(), path);
        let file = self
            .file
            .search_file_mut(path.trim_start_matches('/'))
            .ok_or_else(|| NitroError::NotFound(path.to_string()))?;
        file.replace_data(content);
        Ok(())
    }

    pub fn exists<P: AsRef<str>>(&self, path: P) -> bool {
        self.file
            .search(path.as_ref().trim_start_matches('/'))
            .is_some()
    }

    /// Direct children of a folder, folders first then by name
    pub fn list<P: AsRef<str>>(&self, folder: P) -> Result<Vec<Entry>> {
        let path = folder.as_ref();
        let trimmed = path.trim_start_matches('/');
        let dir = if trimmed.is_empty() {
            self.file.children()
        } else {
            self.file
                .search(trimmed)
                .and_then(|n| n.as_folder())
                .ok_or_else(|| NitroError::NotFound(path.to_string()))?
        };

        let mut entries: Vec<Entry> = dir.children().iter().map(Entry::from_node).collect();
        entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });
        Ok(entries)
    }

    /// Rebuild the image into a byte vector, keeping the loaded tree
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.file.write_format_to(&mut out)?;
        Ok(out)
    }

    /// Rebuild the image into a file on disk
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        save_rom(&mut self.file, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nitro::FileSystem;

    fn sample_image() -> Vec<u8> {
        let mut system = Folder::new("system");
        system.add_file(GameFile::new("arm9.bin", vec![0x99; 0x80]));
        system.add_file(GameFile::new("arm7.bin", vec![0x77; 0x40]));
        system.add_folder(Folder::new("overlay9"));
        system.add_folder(Folder::new("overlay7"));

        let mut data = Folder::new("data");
        let mut script = Folder::new("script");
        script.add_file(GameFile::new("s01.bin", vec![1u8; 0x30]));
        data.add_folder(script);
        data.add_file(GameFile::new("title.bin", vec![2u8; 0x10]));

        let mut rom = Rom::assemble(
            "game.nds",
            Header::new(),
            Banner::new(1),
            FileSystem::new(),
            data,
            system,
        );
        rom.write_format().unwrap();
        rom.data().as_slice().to_vec()
    }

    #[test]
    fn test_read_and_list() -> Result<()> {
        let rom = RomImage::from_bytes("game.nds", sample_image())?;
        assert_eq!(rom.read("data/script/s01.bin")?, vec![1u8; 0x30]);
        assert_eq!(rom.read("/system/arm7.bin")?.len(), 0x40);
        assert!(rom.exists("data/script"));
        assert!(!rom.exists("data/nope"));

        let entries = rom.list("data")?;
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].name, "script");
        assert_eq!(entries[1].size, Some(0x10));
        assert_eq!(entries[1].path, "/game.nds/data/title.bin");
        Ok(())
    }

    #[test]
    fn test_write_and_rebuild() -> Result<()> {
        let mut rom = RomImage::from_bytes("game.nds", sample_image())?;
        rom.write("data/title.bin", vec![0xAB; 0x500])?;
        let bytes = rom.to_bytes()?;

        let reloaded = RomImage::from_bytes("game.nds", bytes)?;
        assert_eq!(reloaded.read("data/title.bin")?, vec![0xAB; 0x500]);
        assert_eq!(reloaded.read("data/script/s01.bin")?, vec![1u8; 0x30]);
        Ok(())
    }

    #[test]
    fn test_missing_paths() -> Result<()> {
        let mut rom = RomImage::from_bytes("game.nds", sample_image())?;
        assert!(matches!(rom.read("data/x"), Err(NitroError::NotFound(_))));
        assert!(rom.write("data/x", vec![]).is_err());
        assert!(rom.list("data/title.bin").is_err());
        assert_eq!(rom.list("/")?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_open_and_save() -> Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let input = temp_dir.path().join("game.nds");
        let output = temp_dir.path().join("copy.nds");
        std::fs::write(&input, sample_image())?;

        let mut rom = RomImage::open(&input)?;
        assert_eq!(rom.inner().name(), "game.nds");
        rom.save(&output)?;
        assert_eq!(std::fs::read(&output)?, std::fs::read(&input)?);
        Ok(())
    }
}
