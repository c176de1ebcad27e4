//! Files of the container tree

use super::{display_name, join_path, raw_if_distinct, segments, Folder, NodeRef};
use crate::error::{NitroError, Result};
use crate::format::Format;
use crate::io::ByteView;
use std::io::Write;
use tracing::debug;

/// A file in the container tree.
///
/// The content is a [`ByteView`]: either an exclusive buffer or a window
/// into a shared image. Dependencies are virtual paths of other files and
/// only express write ordering. A file may unpack into a subtree of
/// children (its codec decides what they are).
pub struct GameFile {
    name: String,
    raw_name: Option<Vec<u8>>,
    path: String,
    data: ByteView,
    format: Option<Box<dyn Format>>,
    dependencies: Vec<String>,
    children: Folder,
    read: bool,
}

impl GameFile {
    /// Create a detached file
    pub fn new(name: impl Into<String>, data: impl Into<ByteView>) -> Self {
        let name = name.into();
        let path = join_path("", &name);
        let mut children = Folder::new(name.clone());
        children.set_path(&path);

        GameFile {
            name,
            raw_name: None,
            path,
            data: data.into(),
            format: None,
            dependencies: Vec::new(),
            children,
            read: false,
        }
    }

    /// Create a detached file from the bytes its name is stored as.
    ///
    /// The name is shown through [`display_name`]; the bytes are written
    /// back unchanged.
    pub fn from_raw_name(raw: Vec<u8>, data: impl Into<ByteView>) -> Self {
        let mut file = GameFile::new(display_name(&raw), data);
        file.raw_name = raw_if_distinct(&file.name, raw);
        file
    }

    /// Builder-style codec assignment
    pub fn with_format(mut self, format: Box<dyn Format>) -> Self {
        self.set_format(format);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes the name is stored as in a name table
    pub fn raw_name(&self) -> &[u8] {
        self.raw_name.as_deref().unwrap_or(self.name.as_bytes())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn data(&self) -> &ByteView {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the content. Windows are never written through; the new
    /// view simply takes the old one's place.
    pub fn replace_data(&mut self, data: impl Into<ByteView>) {
        self.data = data.into();
    }

    /// Bind a codec; the file must be read again before use
    pub fn set_format(&mut self, format: Box<dyn Format>) {
        debug!("Assigning format {} to {}", format.format_name(), self.path);
        self.format = Some(format);
        self.read = false;
    }

    pub fn format(&self) -> Option<&dyn Format> {
        self.format.as_deref()
    }

    pub fn format_name(&self) -> Option<&str> {
        self.format.as_ref().map(|f| f.format_name())
    }

    pub fn has_format(&self) -> bool {
        self.format.is_some()
    }

    /// True once the bound codec has decoded this file
    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Record that this file must be written after `path`
    pub fn add_dependency(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.dependencies.contains(&path) {
            self.dependencies.push(path);
        }
    }

    pub fn add_dependencies<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            self.add_dependency(path);
        }
    }

    /// Subtree unpacked from this file
    pub fn children(&self) -> &Folder {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Folder {
        &mut self.children
    }

    pub fn add_file(&mut self, file: GameFile) -> &mut GameFile {
        self.children.add_file(file)
    }

    pub fn add_folder(&mut self, folder: Folder) -> &mut Folder {
        self.children.add_folder(folder)
    }

    /// Resolve `path` against this file and its unpacked subtree
    pub fn search(&self, path: &str) -> Option<NodeRef<'_>> {
        if self.is_own_path(path) {
            return Some(NodeRef::File(self));
        }
        self.children.search(path)
    }

    pub fn search_file(&self, path: &str) -> Option<&GameFile> {
        self.search(path)?.as_file()
    }

    pub fn search_file_mut(&mut self, path: &str) -> Option<&mut GameFile> {
        if self.is_own_path(path) {
            return Some(self);
        }
        self.children.search_file_mut(path)
    }

    fn is_own_path(&self, path: &str) -> bool {
        let segs = segments(path);
        if path.starts_with(super::PATH_SEPARATOR) {
            segs == segments(&self.path)
        } else {
            segs.is_empty()
        }
    }

    /// Decode the content with the bound codec
    pub fn read_format(&mut self) -> Result<()> {
        let mut format = self.take_format()?;
        let result = format.read(self);
        self.format = Some(format);
        result?;
        self.read = true;
        Ok(())
    }

    /// Encode with the bound codec and replace the content with the output
    pub fn write_format(&mut self) -> Result<()> {
        let mut buffer = Vec::new();
        let mut format = self.take_format()?;
        let result = format.write(self, &mut buffer);
        self.format = Some(format);
        result?;

        debug!("Rewrote {} ({} bytes)", self.path, buffer.len());
        self.data = ByteView::from_vec(buffer);
        Ok(())
    }

    /// Encode with the bound codec straight into `out`, keeping the content
    pub fn write_format_to(&mut self, out: &mut dyn Write) -> Result<()> {
        let mut format = self.take_format()?;
        let result = format.write(self, out);
        self.format = Some(format);
        result
    }

    /// Feed external sources to the bound codec
    pub fn import(&mut self, sources: &[ByteView]) -> Result<()> {
        let mut format = self.take_format()?;
        let result = format.import(sources);
        self.format = Some(format);
        result
    }

    /// Ask the bound codec to produce external representations
    pub fn export(&mut self, sinks: &mut [&mut dyn Write]) -> Result<()> {
        let mut format = self.take_format()?;
        let result = format.export(sinks);
        self.format = Some(format);
        result
    }

    fn take_format(&mut self) -> Result<Box<dyn Format>> {
        self.format
            .take()
            .ok_or_else(|| NitroError::NoFormat(self.path.clone()))
    }

    pub(crate) fn set_parent_path(&mut self, parent: &str) {
        self.path = join_path(parent, &self.name);
        let path = self.path.clone();
        self.children.set_path(&path);
    }
}

impl std::fmt::Debug for GameFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameFile")
            .field("path", &self.path)
            .field("len", &self.data.len())
            .field("format", &self.format_name())
            .field("dependencies", &self.dependencies)
            .field("children", &self.children.len())
            .finish()
    }
}
