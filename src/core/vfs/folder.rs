//! Folders, tree nodes and path search

use super::{display_name, join_path, raw_if_distinct, segments, GameFile};
use tracing::debug;

/// A node of the container tree
#[derive(Debug)]
pub enum Node {
    Folder(Folder),
    File(GameFile),
}

/// Borrowed view of a node returned by searches
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Folder(&'a Folder),
    File(&'a GameFile),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Folder(folder) => folder.name(),
            Node::File(file) => file.name(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Node::Folder(folder) => folder.path(),
            Node::File(file) => file.path(),
        }
    }

    pub fn raw_name(&self) -> &[u8] {
        match self {
            Node::Folder(folder) => folder.raw_name(),
            Node::File(file) => file.raw_name(),
        }
    }

    pub fn as_ref(&self) -> NodeRef<'_> {
        match self {
            Node::Folder(folder) => NodeRef::Folder(folder),
            Node::File(file) => NodeRef::File(file),
        }
    }

    pub fn as_file(&self) -> Option<&GameFile> {
        match self {
            Node::File(file) => Some(file),
            Node::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Node::Folder(folder) => Some(folder),
            Node::File(_) => None,
        }
    }

    /// Resolve `path` starting at this node
    pub fn search(&self, path: &str) -> Option<NodeRef<'_>> {
        match self {
            Node::Folder(folder) => folder.search(path),
            Node::File(file) => file.search(path),
        }
    }

    pub fn search_file(&self, path: &str) -> Option<&GameFile> {
        match self.search(path)? {
            NodeRef::File(file) => Some(file),
            NodeRef::Folder(_) => None,
        }
    }

    pub fn search_file_mut(&mut self, path: &str) -> Option<&mut GameFile> {
        match self {
            Node::Folder(folder) => folder.search_file_mut(path),
            Node::File(file) => file.search_file_mut(path),
        }
    }

    pub(crate) fn set_parent_path(&mut self, parent: &str) {
        match self {
            Node::Folder(folder) => folder.set_parent_path(parent),
            Node::File(file) => file.set_parent_path(parent),
        }
    }
}

impl<'a> NodeRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            NodeRef::Folder(folder) => folder.name(),
            NodeRef::File(file) => file.name(),
        }
    }

    pub fn path(&self) -> &'a str {
        match self {
            NodeRef::Folder(folder) => folder.path(),
            NodeRef::File(file) => file.path(),
        }
    }

    pub fn as_file(&self) -> Option<&'a GameFile> {
        match *self {
            NodeRef::File(file) => Some(file),
            NodeRef::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&'a Folder> {
        match *self {
            NodeRef::Folder(folder) => Some(folder),
            NodeRef::File(_) => None,
        }
    }

    /// Children visible below this node (a file's unpacked subtree)
    fn container(&self) -> &'a Folder {
        match *self {
            NodeRef::Folder(folder) => folder,
            NodeRef::File(file) => file.children(),
        }
    }
}

/// Ordered collection of named nodes
#[derive(Debug)]
pub struct Folder {
    name: String,
    raw_name: Option<Vec<u8>>,
    path: String,
    children: Vec<Node>,
}

impl Folder {
    /// Create a detached folder; an empty name makes an anonymous root
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let path = if name.is_empty() {
            String::new()
        } else {
            join_path("", &name)
        };

        Folder {
            name,
            raw_name: None,
            path,
            children: Vec::new(),
        }
    }

    /// Create a detached folder from the bytes its name is stored as
    pub fn from_raw_name(raw: Vec<u8>) -> Self {
        let mut folder = Folder::new(display_name(&raw));
        folder.raw_name = raw_if_distinct(&folder.name, raw);
        folder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_name(&self) -> &[u8] {
        self.raw_name.as_deref().unwrap_or(self.name.as_bytes())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Attach a file, replacing any child with the same name
    pub fn add_file(&mut self, file: GameFile) -> &mut GameFile {
        match self.insert(Node::File(file)) {
            Node::File(file) => file,
            Node::Folder(_) => unreachable!("inserted node changed kind"),
        }
    }

    /// Attach a folder, replacing any child with the same name
    pub fn add_folder(&mut self, folder: Folder) -> &mut Folder {
        match self.insert(Node::Folder(folder)) {
            Node::Folder(folder) => folder,
            Node::File(_) => unreachable!("inserted node changed kind"),
        }
    }

    fn insert(&mut self, mut node: Node) -> &mut Node {
        node.set_parent_path(&self.path);

        let idx = match self.children.iter().position(|c| c.name() == node.name()) {
            Some(idx) => {
                debug!("Replacing {} in {}", node.name(), self.path);
                self.children[idx] = node;
                idx
            }
            None => {
                self.children.push(node);
                self.children.len() - 1
            }
        };

        &mut self.children[idx]
    }

    /// Detach a direct child by name
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let idx = self.children.iter().position(|c| c.name() == name)?;
        Some(self.children.remove(idx))
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name() == name)
    }

    pub fn file(&self, name: &str) -> Option<&GameFile> {
        self.child(name).and_then(Node::as_file)
    }

    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.child(name).and_then(Node::as_folder)
    }

    pub fn file_mut(&mut self, name: &str) -> Option<&mut GameFile> {
        self.children.iter_mut().find_map(|c| match c {
            Node::File(file) if file.name() == name => Some(file),
            _ => None,
        })
    }

    pub fn folder_mut(&mut self, name: &str) -> Option<&mut Folder> {
        self.children.iter_mut().find_map(|c| match c {
            Node::Folder(folder) if folder.name() == name => Some(folder),
            _ => None,
        })
    }

    /// Direct child files in order
    pub fn files(&self) -> impl Iterator<Item = &GameFile> {
        self.children.iter().filter_map(Node::as_file)
    }

    /// Direct child folders in order
    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.children.iter().filter_map(Node::as_folder)
    }

    /// All files below this folder, depth first in child order.
    ///
    /// Subtrees unpacked from files are not visited.
    pub fn walk_files(&self) -> Vec<&GameFile> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(folder) = stack.pop() {
            // Reverse so the first subfolder is visited first
            let mut pending = Vec::new();
            for child in &folder.children {
                match child {
                    Node::File(file) => out.push(file),
                    Node::Folder(sub) => pending.push(sub),
                }
            }
            stack.extend(pending.into_iter().rev());
        }
        out
    }

    pub fn count_files(&self) -> usize {
        self.walk_files().len()
    }

    /// Resolve `path` against this folder.
    ///
    /// Absolute paths must start with this folder's own path; relative
    /// paths are resolved from this folder. Missing segments yield `None`.
    pub fn search(&self, path: &str) -> Option<NodeRef<'_>> {
        let segs = self.relative_segments(path)?;
        let mut current = NodeRef::Folder(self);
        for seg in segs {
            current = current.container().child(seg)?.as_ref();
        }
        Some(current)
    }

    pub fn search_file(&self, path: &str) -> Option<&GameFile> {
        self.search(path)?.as_file()
    }

    pub fn search_folder(&self, path: &str) -> Option<&Folder> {
        self.search(path)?.as_folder()
    }

    pub fn search_file_mut(&mut self, path: &str) -> Option<&mut GameFile> {
        let segs = self.relative_segments(path)?;
        match node_mut(self, &segs)? {
            Node::File(file) => Some(file),
            Node::Folder(_) => None,
        }
    }

    fn relative_segments<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let all = segments(path);
        if !path.starts_with(super::PATH_SEPARATOR) {
            return Some(all);
        }

        let own = segments(&self.path);
        if all.len() < own.len() || all[..own.len()] != own[..] {
            return None;
        }
        Some(all[own.len()..].to_vec())
    }

    pub(crate) fn set_parent_path(&mut self, parent: &str) {
        self.path = join_path(parent, &self.name);
        self.repath_children();
    }

    /// Keep the name but move the folder to an explicit path
    pub(crate) fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
        self.repath_children();
    }

    fn repath_children(&mut self) {
        let path = self.path.clone();
        for child in &mut self.children {
            child.set_parent_path(&path);
        }
    }
}

fn node_mut<'a>(folder: &'a mut Folder, segs: &[&str]) -> Option<&'a mut Node> {
    let (head, rest) = segs.split_first()?;
    let child = folder.children.iter_mut().find(|c| c.name() == *head)?;
    if rest.is_empty() {
        return Some(child);
    }

    match child {
        Node::Folder(sub) => node_mut(sub, rest),
        Node::File(file) => node_mut(file.children_mut(), rest),
    }
}
