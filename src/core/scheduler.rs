//! Dependency-ordered write queue
//!
//! Files touched by an import must be rewritten, and a file derived from
//! other files must be rewritten after them. [`UpdateQueue::enqueue`] walks
//! the dependency graph depth first with an explicit stack, queues every
//! dependency before its dependent and rejects cycles.

use crate::error::{NitroError, Result};
use crate::vfs::{Folder, GameFile, Node};
use std::collections::HashSet;
use tracing::debug;

/// Anything that can list the dependencies of a virtual path
pub trait DependencySource {
    /// Paths that must be written before `path`; `NotFound` if unknown
    fn dependencies_of(&self, path: &str) -> Result<Vec<String>>;
}

impl DependencySource for Folder {
    fn dependencies_of(&self, path: &str) -> Result<Vec<String>> {
        self.search_file(path)
            .map(|file| file.dependencies().to_vec())
            .ok_or_else(|| NitroError::NotFound(path.to_string()))
    }
}

impl DependencySource for GameFile {
    fn dependencies_of(&self, path: &str) -> Result<Vec<String>> {
        self.search_file(path)
            .map(|file| file.dependencies().to_vec())
            .ok_or_else(|| NitroError::NotFound(path.to_string()))
    }
}

impl DependencySource for Node {
    fn dependencies_of(&self, path: &str) -> Result<Vec<String>> {
        match self {
            Node::Folder(folder) => folder.dependencies_of(path),
            Node::File(file) => file.dependencies_of(path),
        }
    }
}

struct Frame {
    path: String,
    dependencies: Vec<String>,
    next: usize,
}

/// Ordered set of paths waiting to be written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateQueue {
    paths: Vec<String>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn position(&self, path: &str) -> Option<usize> {
        self.paths.iter().position(|p| p == path)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Take the queued paths in write order, leaving the queue empty
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.paths)
    }

    /// Queue `path` after all of its transitive dependencies.
    ///
    /// Already queued paths are left where they are, so enqueueing is
    /// idempotent and unrelated paths keep the order they were first
    /// touched in. A dependency cycle fails with `DependencyCycle` and
    /// leaves paths queued before the cycle was found in place.
    pub fn enqueue<S>(&mut self, source: &S, path: &str) -> Result<()>
    where
        S: DependencySource + ?Sized,
    {
        if self.contains(path) {
            return Ok(());
        }

        let mut on_stack: HashSet<String> = HashSet::new();
        let mut stack = vec![Frame {
            path: path.to_string(),
            dependencies: source.dependencies_of(path)?,
            next: 0,
        }];
        on_stack.insert(path.to_string());

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.dependencies.len() {
                let dep = frame.dependencies[frame.next].clone();
                frame.next += 1;

                if self.contains(&dep) {
                    continue;
                }
                if on_stack.contains(&dep) {
                    return Err(NitroError::DependencyCycle(dep));
                }

                let dependencies = source.dependencies_of(&dep)?;
                on_stack.insert(dep.clone());
                stack.push(Frame {
                    path: dep,
                    dependencies,
                    next: 0,
                });
                continue;
            }

            // All dependencies are queued, so appending keeps them ahead
            if let Some(done) = stack.pop() {
                on_stack.remove(&done.path);
                debug!("Queued {} at {}", done.path, self.paths.len());
                self.paths.push(done.path);
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a UpdateQueue {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}
