//! Virtual container tree
//!
//! Ordered hierarchy of [`Folder`]s and [`GameFile`]s. Every node knows its
//! absolute virtual path (`/`-joined names from the tree root), which is
//! recomputed whenever a subtree is attached to a new parent.
//!
//! A file can itself unpack into a subtree (a cartridge image exposes its
//! `data` and `system` folders as children of the image file), so path
//! searches descend through files as well as folders.

mod file;
mod folder;

pub use file::GameFile;
pub use folder::{Folder, Node, NodeRef};

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// Build the path of a child named `name` under a parent path
pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with(PATH_SEPARATOR) {
        format!("{}{}", parent, name)
    } else {
        format!("{}{}{}", parent, PATH_SEPARATOR, name)
    }
}

/// Printable form of a stored name.
///
/// Bytes that are not UTF-8 are shown as `%XX`, so distinct stored names
/// stay distinct.
pub fn display_name(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, tail) = rest.split_at(e.valid_up_to());
                out.push_str(&String::from_utf8_lossy(valid));
                let bad = e.error_len().unwrap_or(tail.len());
                for byte in &tail[..bad] {
                    out.push_str(&format!("%{:02X}", byte));
                }
                rest = &tail[bad..];
            }
        }
    }
}

/// Stored bytes for a name shown as `name`, when they differ from its UTF-8
pub(crate) fn raw_if_distinct(name: &str, raw: Vec<u8>) -> Option<Vec<u8>> {
    if raw == name.as_bytes() {
        None
    } else {
        Some(raw)
    }
}

/// Split a path into its non-empty segments
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests;
