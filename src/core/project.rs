//! Project specification
//!
//! Declares the virtual paths a modification project knows about:
//! which codec each path uses, what it depends on and the codec
//! parameters. Read from TOML or JSON.
//!
//! ```toml
//! name = "ninokuni-es"
//! version = "0.3.0"
//!
//! [[files]]
//! path = "/game.nds"
//! format = "Nitro.ROM"
//! params = { update_crc = true }
//!
//! [[files]]
//! path = "/game.nds/data/script/s01.bin"
//! format = "Common.Replace"
//! dependencies = ["/game.nds/data/script/index.bin"]
//! ```

use crate::error::{NitroError, Result};
use crate::format::FormatRegistry;
use crate::scheduler::{DependencySource, UpdateQueue};
use crate::validation::{normalize_virtual_path, validate_format_name};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// One declared virtual path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Absolute virtual path, e.g. `/game.nds/data/a.bin`
    pub path: String,

    /// Registry name of the codec bound to the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Paths that must be written before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Free-form codec parameters
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl FileSpec {
    pub fn new(path: impl Into<String>) -> Self {
        FileSpec {
            path: path.into(),
            format: None,
            dependencies: Vec::new(),
            params: Value::Null,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_dependency(mut self, path: impl Into<String>) -> Self {
        self.dependencies.push(path.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Project specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Project name
    pub name: String,

    /// Semantic version of the project
    pub version: Version,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Declared files in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSpec>,
}

impl ProjectSpec {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        ProjectSpec {
            name: name.into(),
            version,
            description: None,
            created: Some(chrono::Utc::now().to_rfc3339()),
            files: Vec::new(),
        }
    }

    /// Load from a `.toml` or `.json` file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let spec = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text)?,
            Some("json") => Self::from_json_str(&text)?,
            _ => {
                return Err(NitroError::InvalidSpec(format!(
                    "{}: expected a .toml or .json project file",
                    path.display()
                )))
            }
        };
        debug!(
            "Loaded project {} {} ({} files)",
            spec.name,
            spec.version,
            spec.files.len()
        );
        Ok(spec)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let spec: ProjectSpec = toml::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let spec: ProjectSpec = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check paths, format names, dependencies and cycles
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NitroError::InvalidSpec(
                "project name cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            check_canonical(&file.path)?;
            if !seen.insert(file.path.as_str()) {
                return Err(NitroError::InvalidSpec(format!(
                    "{} declared twice",
                    file.path
                )));
            }
            if let Some(format) = &file.format {
                validate_format_name(format)?;
            }
        }

        for file in &self.files {
            for dep in &file.dependencies {
                check_canonical(dep)?;
                if !seen.contains(dep.as_str()) {
                    return Err(NitroError::InvalidSpec(format!(
                        "{} depends on undeclared {}",
                        file.path, dep
                    )));
                }
            }
        }

        let mut queue = UpdateQueue::new();
        for file in &self.files {
            queue.enqueue(self, &file.path)?;
        }

        Ok(())
    }

    /// Fail with `UnknownFormat` if a declared codec is not registered
    pub fn check_formats(&self, registry: &FormatRegistry) -> Result<()> {
        for format in self.files.iter().filter_map(|f| f.format.as_deref()) {
            if !registry.contains(format) {
                return Err(NitroError::UnknownFormat(format.to_string()));
            }
        }
        Ok(())
    }

    pub fn file(&self, path: &str) -> Option<&FileSpec> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a file; a previous declaration of the same path is replaced
    pub fn add_file(mut self, file: FileSpec) -> Self {
        self.files.retain(|f| f.path != file.path);
        self.files.push(file);
        self
    }
}

impl DependencySource for ProjectSpec {
    fn dependencies_of(&self, path: &str) -> Result<Vec<String>> {
        self.file(path)
            .map(|f| f.dependencies.clone())
            .ok_or_else(|| NitroError::NotFound(path.to_string()))
    }
}

fn check_canonical(path: &str) -> Result<()> {
    let normalized = normalize_virtual_path(path)?;
    if normalized != path {
        return Err(NitroError::InvalidSpec(format!(
            "path '{}' should be written as '{}'",
            path, normalized
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ProjectSpec {
        ProjectSpec::new("sample", Version::new(0, 1, 0))
            .add_file(
                FileSpec::new("/game.nds")
                    .with_format("Nitro.ROM")
                    .with_params(json!({ "update_crc": true })),
            )
            .add_file(FileSpec::new("/game.nds/data/b").with_format("Common.Replace"))
            .add_file(
                FileSpec::new("/game.nds/data/a")
                    .with_format("Common.Replace")
                    .with_dependency("/game.nds/data/b"),
            )
    }

    #[test]
    fn test_builder_pattern() -> Result<()> {
        let spec = sample().with_description("Translation patch");
        spec.validate()?;

        assert_eq!(spec.files.len(), 3);
        assert!(spec.created.is_some());
        assert_eq!(
            spec.file("/game.nds/data/a").unwrap().dependencies,
            vec!["/game.nds/data/b".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_add_file_replaces() {
        let spec = sample().add_file(FileSpec::new("/game.nds/data/a"));
        assert_eq!(spec.files.len(), 3);
        assert!(spec.file("/game.nds/data/a").unwrap().format.is_none());
    }

    #[test]
    fn test_from_toml() -> Result<()> {
        let spec = ProjectSpec::from_toml_str(
            r#"
            name = "toml-project"
            version = "1.2.3-beta.1"

            [[files]]
            path = "/game.nds"
            format = "Nitro.ROM"
            params = { update_crc = true }

            [[files]]
            path = "/game.nds/data/a"
            format = "Common.Replace"
            dependencies = ["/game.nds"]
            "#,
        )?;

        assert_eq!(spec.version, Version::parse("1.2.3-beta.1").unwrap());
        assert_eq!(spec.files[0].params, json!({ "update_crc": true }));
        assert_eq!(spec.files[1].dependencies.len(), 1);
        Ok(())
    }

    #[test]
    fn test_json_roundtrip() -> Result<()> {
        let spec = sample();
        let parsed = ProjectSpec::from_json_str(&spec.to_json_string()?)?;
        assert_eq!(parsed, spec);
        Ok(())
    }

    #[test]
    fn test_load_by_extension() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let json_path = dir.path().join("project.json");
        std::fs::write(&json_path, sample().to_json_string()?)?;
        assert_eq!(ProjectSpec::load(&json_path)?.name, "sample");

        let other = dir.path().join("project.xml");
        std::fs::write(&other, "<Project/>")?;
        assert!(matches!(
            ProjectSpec::load(&other),
            Err(NitroError::InvalidSpec(_))
        ));
        Ok(())
    }

    #[test]
    fn test_duplicate_path() {
        let mut spec = sample();
        spec.files.push(FileSpec::new("/game.nds/data/a"));
        assert!(matches!(spec.validate(), Err(NitroError::InvalidSpec(_))));
    }

    #[test]
    fn test_undeclared_dependency() {
        let spec = sample().add_file(FileSpec::new("/game.nds/data/c").with_dependency("/nowhere"));
        assert!(matches!(spec.validate(), Err(NitroError::InvalidSpec(_))));
    }

    #[test]
    fn test_cycle_rejected() {
        let spec = sample().add_file(
            FileSpec::new("/game.nds/data/b").with_dependency("/game.nds/data/a"),
        );
        assert!(matches!(
            spec.validate(),
            Err(NitroError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_non_canonical_path() {
        let spec = ProjectSpec::new("p", Version::new(1, 0, 0))
            .add_file(FileSpec::new("/game.nds//data/a/"));
        assert!(matches!(spec.validate(), Err(NitroError::InvalidSpec(_))));

        let relative = ProjectSpec::new("p", Version::new(1, 0, 0)).add_file(FileSpec::new("data"));
        assert!(matches!(relative.validate(), Err(NitroError::InvalidName(_))));
    }

    #[test]
    fn test_bad_format_name() {
        let spec = ProjectSpec::new("p", Version::new(1, 0, 0))
            .add_file(FileSpec::new("/a").with_format("replace"));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_check_formats() {
        let registry = FormatRegistry::with_builtin();
        assert!(sample().check_formats(&registry).is_ok());

        let spec = sample().add_file(FileSpec::new("/x").with_format("Ninokuni.Subtitle"));
        assert!(matches!(
            spec.check_formats(&registry),
            Err(NitroError::UnknownFormat(name)) if name == "Ninokuni.Subtitle"
        ));
    }
}
