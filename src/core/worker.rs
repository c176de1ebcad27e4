//! Batch driver
//!
//! A [`Worker`] owns a loaded container tree together with the project
//! and edit specifications. It binds codecs to files as they are reached
//! ([`Worker::rescue_file`]), runs export and import batches over the
//! files listed in the edit specification and finally writes every touched
//! file back in dependency order.
//!
//! Per-file problems are isolated: a codec that lacks a direction is
//! skipped, a failing import is logged and recorded in the [`BatchReport`].
//! Structural problems (unknown paths, malformed images, dependency
//! cycles) abort the batch.

use crate::edit::{EditSpec, Variables};
use crate::error::{NitroError, Result};
use crate::format::FormatRegistry;
use crate::io::ByteView;
use crate::project::ProjectSpec;
use crate::scheduler::{DependencySource, UpdateQueue};
use crate::validation::normalize_virtual_path;
use crate::vfs::{segments, GameFile, Node, NodeRef};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which listed files an import batch picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFilter {
    /// Every file whose sources exist
    All,
    /// Only files with at least one source modified after the instant
    ModifiedAfter(DateTime<Utc>),
}

impl ImportFilter {
    /// Filter on the modification time of `path`, typically the input image
    pub fn newer_than<P: AsRef<Path>>(path: P) -> Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(ImportFilter::ModifiedAfter(DateTime::<Utc>::from(modified)))
    }

    pub fn accepts(&self, source: &Path) -> bool {
        match self {
            ImportFilter::All => true,
            ImportFilter::ModifiedAfter(after) => fs::metadata(source)
                .and_then(|m| m.modified())
                .map(|t| DateTime::<Utc>::from(t) > *after)
                .unwrap_or(false),
        }
    }
}

/// Outcome of one export or import batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files whose codec ran successfully
    pub processed: Vec<String>,
    /// Files left out because a source was missing or filtered out
    pub skipped: Vec<String>,
    /// Files whose codec does not support the direction
    pub unsupported: Vec<String>,
    /// Files whose codec failed, with the error
    pub failed: Vec<(String, NitroError)>,
}

impl BatchReport {
    /// True when no file failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.unsupported.len() + self.failed.len()
    }
}

/// Dependencies from the project spec, falling back to the tree
struct Dependencies<'a> {
    project: &'a ProjectSpec,
    root: &'a Node,
}

impl DependencySource for Dependencies<'_> {
    fn dependencies_of(&self, path: &str) -> Result<Vec<String>> {
        match self.project.file(path) {
            Some(spec) => Ok(spec.dependencies.clone()),
            None => self.root.dependencies_of(path),
        }
    }
}

pub struct Worker {
    root: Node,
    project: ProjectSpec,
    edit: EditSpec,
    variables: Variables,
    registry: FormatRegistry,
    queue: UpdateQueue,
}

impl Worker {
    /// Validate both specifications and take ownership of the tree.
    ///
    /// The root is either a single image file or a folder of input files.
    pub fn new(
        root: Node,
        project: ProjectSpec,
        edit: EditSpec,
        registry: FormatRegistry,
    ) -> Result<Self> {
        project.validate()?;
        project.check_formats(&registry)?;
        let variables = edit.resolve_variables()?;

        info!(
            "Worker for {} {} on {} ({} edits)",
            project.name,
            project.version,
            root.path(),
            edit.files.len()
        );

        Ok(Worker {
            root,
            project,
            edit,
            variables,
            registry,
            queue: UpdateQueue::new(),
        })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    pub fn project(&self) -> &ProjectSpec {
        &self.project
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Paths waiting to be written, in write order
    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    /// Reach `path`, unpacking every container file on the way.
    ///
    /// Each file along the path gets the codec and dependencies the
    /// project declares for it and is decoded once. Fails with `NotFound`
    /// when a segment does not exist even after unpacking its parent.
    pub fn rescue_file(&mut self, path: &str) -> Result<&mut GameFile> {
        let path = normalize_virtual_path(path)?;

        let mut prefix = String::with_capacity(path.len());
        for seg in segments(&path) {
            prefix.push('/');
            prefix.push_str(seg);

            let is_file = match self.root.search(&prefix) {
                None => return Err(NitroError::NotFound(path.clone())),
                Some(NodeRef::Folder(_)) => false,
                Some(NodeRef::File(_)) => true,
            };
            if is_file {
                self.prepare(&prefix)?;
            }
        }

        self.root
            .search_file_mut(&path)
            .ok_or(NitroError::NotFound(path))
    }

    fn prepare(&mut self, path: &str) -> Result<()> {
        let file = self
            .root
            .search_file_mut(path)
            .ok_or_else(|| NitroError::NotFound(path.to_string()))?;

        if let Some(spec) = self.project.file(path) {
            if let Some(name) = &spec.format {
                if file.format_name() != Some(name.as_str()) {
                    file.set_format(self.registry.create_with(name, &spec.params)?);
                }
            }
            file.add_dependencies(spec.dependencies.iter().cloned());
        }

        if file.has_format() && !file.is_read() {
            debug!("Decoding {}", path);
            file.read_format()?;
        }
        Ok(())
    }

    /// Schedule `path` (and what it depends on) for writing
    pub fn touch(&mut self, path: &str) -> Result<()> {
        let path = normalize_virtual_path(path)?;
        let source = Dependencies {
            project: &self.project,
            root: &self.root,
        };
        self.queue.enqueue(&source, &path)
    }

    /// Export every listed file to its external locations
    pub fn export_batch(&mut self) -> Result<BatchReport> {
        let edits = self.edit.files.clone();
        info!("Exporting {} files", edits.len());

        let mut report = BatchReport::default();
        for edit in &edits {
            let targets = match self.variables.resolve_paths(edit) {
                Ok(targets) => targets,
                Err(e) => {
                    warn!("Skipping export of {}: {}", edit.path, e);
                    report.failed.push((edit.path.clone(), e));
                    continue;
                }
            };
            if targets.is_empty() {
                continue;
            }

            // Targets are only touched once the codec has succeeded
            let file = self.rescue_file(&edit.path)?;
            let mut buffers = vec![Vec::new(); targets.len()];
            let result = {
                let mut sinks: Vec<&mut dyn Write> =
                    buffers.iter_mut().map(|b| b as &mut dyn Write).collect();
                file.export(&mut sinks)
            };

            match result {
                Ok(()) => {
                    for (target, buffer) in targets.iter().zip(&buffers) {
                        let parent = target.parent().filter(|p| !p.as_os_str().is_empty());
                        if let Some(parent) = parent {
                            fs::create_dir_all(parent)?;
                        }
                        fs::write(target, buffer)?;
                    }
                    debug!("Exported {} to {} files", edit.path, targets.len());
                    report.processed.push(edit.path.clone());
                }
                Err(e) if e.is_unsupported() => {
                    debug!("{}", e);
                    report.unsupported.push(edit.path.clone());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Export of {} failed: {}", edit.path, e);
                    report.failed.push((edit.path.clone(), e));
                }
            }
        }

        info!(
            "Export finished: {} exported, {} unsupported, {} failed",
            report.processed.len(),
            report.unsupported.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Import every listed file whose sources all exist and pass `filter`
    pub fn import_batch(&mut self, filter: &ImportFilter) -> Result<BatchReport> {
        let edits = self.edit.files.clone();
        info!("Importing {} files", edits.len());

        let mut report = BatchReport::default();
        for edit in &edits {
            let resolved = normalize_virtual_path(&edit.path)
                .and_then(|path| Ok((path, self.variables.resolve_paths(edit)?)));
            let (path, sources) = match resolved {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!("Skipping import of {}: {}", edit.path, e);
                    report.failed.push((edit.path.clone(), e));
                    continue;
                }
            };

            if sources.is_empty()
                || !sources.iter().all(|s| s.is_file())
                || !sources.iter().any(|s| filter.accepts(s))
            {
                debug!("Skipping {}: sources missing or unchanged", path);
                report.skipped.push(path);
                continue;
            }

            match self.import_one(&path, &sources) {
                Ok(()) => {
                    self.touch(&path)?;
                    report.processed.push(path);
                }
                Err(e) if e.is_unsupported() => {
                    warn!("{}: {}", path, e);
                    report.unsupported.push(path);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Import of {} failed: {}", path, e);
                    let failure = NitroError::ImportFailure {
                        path: path.clone(),
                        source: Box::new(e),
                    };
                    report.failed.push((path, failure));
                }
            }
        }

        info!(
            "Import finished: {} imported, {} skipped, {} unsupported, {} failed",
            report.processed.len(),
            report.skipped.len(),
            report.unsupported.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn import_one(&mut self, path: &str, sources: &[PathBuf]) -> Result<()> {
        let views = sources
            .iter()
            .map(ByteView::open)
            .collect::<Result<Vec<_>>>()?;
        let file = self.rescue_file(path)?;
        file.import(&views)?;
        debug!("Imported {} from {} sources", path, views.len());
        Ok(())
    }

    /// Rewrite every queued file and emit the outputs.
    ///
    /// Queued files are encoded in queue order, then every container they
    /// live in is re-encoded, deepest first. A single-file root is encoded
    /// straight into `outputs[0]`; a folder root writes its top-level files
    /// to `outputs` in order.
    pub fn write(&mut self, outputs: &[PathBuf]) -> Result<()> {
        let root_file = match &self.root {
            Node::File(file) => {
                if outputs.len() != 1 {
                    return Err(NitroError::InvalidSpec(format!(
                        "a single image root needs one output, got {}",
                        outputs.len()
                    )));
                }
                Some(file.path().to_string())
            }
            Node::Folder(folder) => {
                let count = folder.files().count();
                if count != outputs.len() {
                    return Err(NitroError::InvalidSpec(format!(
                        "{} top-level files but {} outputs",
                        count,
                        outputs.len()
                    )));
                }
                None
            }
        };

        let queued = self.queue.take();
        info!("Writing {} queued files", queued.len());

        let mut containers = BTreeSet::new();
        for path in &queued {
            self.rescue_file(path)?;
            containers.extend(self.containers_of(path));
        }
        if let Some(root_path) = &root_file {
            if queued.contains(root_path) {
                containers.insert(root_path.clone());
            }
        }

        for path in queued.iter().filter(|p| !containers.contains(*p)) {
            let file = self
                .root
                .search_file_mut(path)
                .ok_or_else(|| NitroError::NotFound(path.clone()))?;
            if file.has_format() {
                file.write_format()?;
            }
        }

        let mut containers: Vec<String> = containers.into_iter().collect();
        containers.sort_by_key(|p| std::cmp::Reverse(segments(p).len()));

        let mut out_written = false;
        for path in &containers {
            let file = self
                .root
                .search_file_mut(path)
                .ok_or_else(|| NitroError::NotFound(path.clone()))?;

            if root_file.as_deref() == Some(path.as_str()) {
                info!("Writing {} to {}", path, outputs[0].display());
                let mut out = BufWriter::new(File::create(&outputs[0])?);
                file.write_format_to(&mut out)?;
                out.flush()?;
                out_written = true;
            } else {
                file.write_format()?;
            }
        }

        match &self.root {
            Node::File(file) if !out_written => file.data().write_to_path(&outputs[0])?,
            Node::File(_) => {}
            Node::Folder(folder) => {
                for (file, output) in folder.files().zip(outputs) {
                    info!("Writing {} to {}", file.path(), output.display());
                    file.data().write_to_path(output)?;
                }
            }
        }
        Ok(())
    }

    /// Ancestors of `path` that are files with a codec
    fn containers_of(&self, path: &str) -> Vec<String> {
        let segs = segments(path);
        let mut out = Vec::new();
        let mut prefix = String::new();
        for seg in segs.iter().take(segs.len().saturating_sub(1)) {
            prefix.push('/');
            prefix.push_str(seg);
            if let Some(NodeRef::File(file)) = self.root.search(&prefix) {
                if file.has_format() {
                    out.push(prefix.clone());
                }
            }
        }
        out
    }
}
