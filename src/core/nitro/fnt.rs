//! File name table
//!
//! A main table of 8-byte records, one per directory (subtable offset,
//! first file id, parent id), followed by the name subtables. Each subtable
//! entry is a length byte and a name; a set top bit marks a directory,
//! followed by its 16-bit id (`0xF000 | index`). Files take implicit ids,
//! consecutive from the directory's first file id. The root's parent slot
//! holds the directory count instead.

use crate::error::{NitroError, Result};
use crate::io::{ByteReader, ByteView};
use crate::validation::validate_name_bytes;
use crate::vfs::{display_name, Folder, GameFile, NodeRef};
use std::collections::HashMap;
use tracing::debug;

const MAIN_ENTRY_SIZE: usize = 8;
const DIRECTORY_FLAG: u8 = 0x80;
const DIRECTORY_ID_BASE: u16 = 0xF000;

/// Most directories a table can address
pub const MAX_DIRECTORIES: usize = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FntEntryKind {
    /// File id
    File(u16),
    /// Directory index (id without the `0xF000` base)
    Directory(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FntEntry {
    /// Printable name, see [`display_name`]
    pub name: String,
    /// Name bytes as stored
    pub raw_name: Vec<u8>,
    pub kind: FntEntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FntDirectory {
    pub first_file_id: u16,
    /// Parent id, or the directory count for the root
    pub parent: u16,
    pub entries: Vec<FntEntry>,
}

/// Decoded name table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fnt {
    directories: Vec<FntDirectory>,
}

/// Encoded table plus the files in the id order it assigned
pub struct EncodedFnt<'a> {
    pub bytes: Vec<u8>,
    pub files: Vec<&'a GameFile>,
    pub directory_count: usize,
}

impl Fnt {
    pub fn directories(&self) -> &[FntDirectory] {
        &self.directories
    }

    /// Every file id named by the table, in table order
    pub fn file_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.directories
            .iter()
            .flat_map(|dir| dir.entries.iter())
            .filter_map(|entry| match entry.kind {
                FntEntryKind::File(id) => Some(id),
                FntEntryKind::Directory(_) => None,
            })
    }

    /// Decode the main table and every subtable
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        r.seek(6)?;
        let count = r.u16()? as usize;
        if count == 0 || count > MAX_DIRECTORIES || count * MAIN_ENTRY_SIZE > bytes.len() {
            return Err(NitroError::malformed(format!(
                "FNT declares {} directories in {:#x} bytes",
                count,
                bytes.len()
            )));
        }

        r.seek(0)?;
        let mut directories = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = r.u32()? as usize;
            let first_file_id = r.u16()?;
            let parent = r.u16()?;
            let entries = decode_subtable(bytes, offset, first_file_id, count)?;
            directories.push(FntDirectory {
                first_file_id,
                parent,
                entries,
            });
        }

        debug!("Decoded FNT with {} directories", count);
        Ok(Fnt { directories })
    }

    /// Rebuild the directory tree under a folder named `name`.
    ///
    /// `bind` supplies the content of each file id.
    pub fn to_folder<F>(&self, name: &str, mut bind: F) -> Result<Folder>
    where
        F: FnMut(u16) -> Result<ByteView>,
    {
        let mut visited = vec![false; self.directories.len()];
        visited[0] = true;
        let mut root = Folder::new(name);
        self.fill_folder(0, &mut root, &mut bind, &mut visited)?;
        Ok(root)
    }

    fn fill_folder<F>(
        &self,
        index: usize,
        folder: &mut Folder,
        bind: &mut F,
        visited: &mut [bool],
    ) -> Result<()>
    where
        F: FnMut(u16) -> Result<ByteView>,
    {
        for entry in &self.directories[index].entries {
            if folder.child(&entry.name).is_some() {
                return Err(NitroError::malformed(format!(
                    "FNT directory {:#x} lists {} twice",
                    index, entry.name
                )));
            }
            match entry.kind {
                FntEntryKind::File(id) => {
                    folder.add_file(GameFile::from_raw_name(entry.raw_name.clone(), bind(id)?));
                }
                FntEntryKind::Directory(sub) => {
                    let sub = sub as usize;
                    if visited[sub] {
                        return Err(NitroError::malformed(format!(
                            "FNT directory {:#x} referenced twice",
                            sub
                        )));
                    }
                    visited[sub] = true;

                    let mut child = Folder::from_raw_name(entry.raw_name.clone());
                    self.fill_folder(sub, &mut child, bind, visited)?;
                    folder.add_folder(child);
                }
            }
        }
        Ok(())
    }

    /// Encode `root` as a name table.
    ///
    /// Directories are numbered depth first in child order; file ids are
    /// dense, starting at `first_file_id`, consecutive per directory.
    pub fn encode(root: &Folder, first_file_id: u16) -> Result<EncodedFnt<'_>> {
        // Pass 1: number directories and size the subtables
        let mut order: Vec<(&Folder, usize)> = Vec::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((folder, parent)) = stack.pop() {
            let index = order.len();
            order.push((folder, parent));
            let subs: Vec<_> = folder.folders().map(|sub| (sub, index)).collect();
            stack.extend(subs.into_iter().rev());
        }

        if order.len() > MAX_DIRECTORIES {
            return Err(NitroError::malformed(format!(
                "{} directories exceed the name table limit of {}",
                order.len(),
                MAX_DIRECTORIES
            )));
        }

        let ids: HashMap<*const Folder, u16> = order
            .iter()
            .enumerate()
            .map(|(idx, (folder, _))| (*folder as *const Folder, idx as u16))
            .collect();

        let mut subtables = Vec::with_capacity(order.len());
        let mut files = Vec::new();
        let mut first_ids = Vec::with_capacity(order.len());
        let mut next_id = first_file_id as usize;

        for (folder, _) in &order {
            first_ids.push(to_file_id(next_id)?);
            let mut table = Vec::new();
            for node in folder.children() {
                let name = node.raw_name();
                validate_name_bytes(name)?;
                match node.as_ref() {
                    NodeRef::File(file) => {
                        table.push(name.len() as u8);
                        table.extend_from_slice(name);
                        files.push(file);
                        next_id += 1;
                    }
                    NodeRef::Folder(sub) => {
                        let id = ids[&(sub as *const Folder)];
                        table.push(DIRECTORY_FLAG | name.len() as u8);
                        table.extend_from_slice(name);
                        table.extend_from_slice(&(DIRECTORY_ID_BASE | id).to_le_bytes());
                    }
                }
            }
            table.push(0);
            subtables.push(table);
        }
        // The last id handed out must fit too
        to_file_id(next_id.saturating_sub(1))?;

        // Pass 2: main table now that offsets are known
        let mut bytes = Vec::new();
        let mut offset = order.len() * MAIN_ENTRY_SIZE;
        for (idx, (_, parent)) in order.iter().enumerate() {
            let parent_field = if idx == 0 {
                order.len() as u16
            } else {
                DIRECTORY_ID_BASE | *parent as u16
            };
            bytes.extend_from_slice(&(offset as u32).to_le_bytes());
            bytes.extend_from_slice(&first_ids[idx].to_le_bytes());
            bytes.extend_from_slice(&parent_field.to_le_bytes());
            offset += subtables[idx].len();
        }
        for table in subtables {
            bytes.extend_from_slice(&table);
        }

        debug!(
            "Encoded FNT: {} directories, {} files, {:#x} bytes",
            order.len(),
            files.len(),
            bytes.len()
        );

        Ok(EncodedFnt {
            bytes,
            files,
            directory_count: order.len(),
        })
    }
}

fn to_file_id(id: usize) -> Result<u16> {
    u16::try_from(id)
        .ok()
        .filter(|&id| id < DIRECTORY_ID_BASE)
        .ok_or_else(|| NitroError::malformed(format!("file id {} out of range", id)))
}

fn decode_subtable(
    bytes: &[u8],
    offset: usize,
    first_file_id: u16,
    directory_count: usize,
) -> Result<Vec<FntEntry>> {
    let mut r = ByteReader::new(bytes);
    r.seek(offset)?;

    let mut entries = Vec::new();
    let mut next_id = first_file_id;
    loop {
        let marker = r.u8()?;
        if marker == 0 {
            break;
        }
        if marker == DIRECTORY_FLAG {
            return Err(NitroError::malformed(format!(
                "reserved FNT marker at {:#x}",
                r.position() - 1
            )));
        }

        let len = (marker & !DIRECTORY_FLAG) as usize;
        let raw_name = r.bytes(len)?.to_vec();
        let name = display_name(&raw_name);

        let kind = if marker & DIRECTORY_FLAG != 0 {
            let id = r.u16()?;
            let index = id.wrapping_sub(DIRECTORY_ID_BASE) as usize;
            if id < DIRECTORY_ID_BASE || index == 0 || index >= directory_count {
                return Err(NitroError::malformed(format!(
                    "FNT entry {} points to invalid directory {:#x}",
                    name, id
                )));
            }
            FntEntryKind::Directory(index as u16)
        } else {
            let id = next_id;
            next_id = next_id
                .checked_add(1)
                .ok_or_else(|| NitroError::malformed("FNT file id overflow"))?;
            FntEntryKind::File(id)
        };

        entries.push(FntEntry {
            name,
            raw_name,
            kind,
        });
    }

    Ok(entries)
}
