//! Edit specification
//!
//! Lists, per virtual path, the external files to import from (or export
//! to). Locations may contain `{$name}` placeholders that expand to
//! variables declared at the top of the file; a variable may itself use
//! the variables declared before it.
//!
//! ```toml
//! [[variables]]
//! name = "root"
//! location = "/home/user/ninokuni"
//!
//! [[variables]]
//! name = "subs"
//! location = "{$root}/subtitles"
//!
//! [[files]]
//! path = "/game.nds/data/movie/s01.bin"
//! imports = ["{$subs}/s01.xml"]
//! ```

use crate::error::{NitroError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const PLACEHOLDER_PATTERN: &str = r"\{\$([A-Za-z0-9_]+)\}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub location: String,
}

/// External sources of one virtual file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: String,
    #[serde(default)]
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSpec {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub files: Vec<FileEdit>,
}

impl EditSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a `.toml` or `.json` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(NitroError::InvalidSpec(format!(
                "{}: expected a .toml or .json edit file",
                path.display()
            ))),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_variable(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.variables.push(Variable {
            name: name.into(),
            location: location.into(),
        });
        self
    }

    pub fn with_file<I, S>(mut self, path: impl Into<String>, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.push(FileEdit {
            path: path.into(),
            imports: imports.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Resolve the declared variables in order
    pub fn resolve_variables(&self) -> Result<Variables> {
        let mut vars = Variables::new()?;
        for var in &self.variables {
            if vars.get(&var.name).is_some() {
                return Err(NitroError::InvalidSpec(format!(
                    "variable {} declared twice",
                    var.name
                )));
            }
            let location = vars.expand(&var.location)?;
            debug!("Variable {} = {}", var.name, location);
            vars.values.push((var.name.clone(), location));
        }
        Ok(vars)
    }
}

/// Resolved variable table
#[derive(Debug, Clone)]
pub struct Variables {
    values: Vec<(String, String)>,
    pattern: Regex,
}

impl Variables {
    pub fn new() -> Result<Self> {
        Ok(Variables {
            values: Vec::new(),
            pattern: Regex::new(PLACEHOLDER_PATTERN)?,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Substitute every `{$name}` in `template`
    pub fn expand(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in self.pattern.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = self
                .get(name.as_str())
                .ok_or_else(|| NitroError::UnresolvedTemplateVariable(name.as_str().to_string()))?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }

    /// Expand the locations of one file edit into filesystem paths
    pub fn resolve_paths(&self, edit: &FileEdit) -> Result<Vec<PathBuf>> {
        edit.imports
            .iter()
            .map(|location| self.expand(location).map(PathBuf::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_in_order() {
        let spec = EditSpec::new()
            .with_variable("root", "/work")
            .with_variable("subs", "{$root}/subs");
        let vars = spec.resolve_variables().unwrap();
        assert_eq!(vars.get("subs"), Some("/work/subs"));
        assert_eq!(vars.expand("{$subs}/s01.xml").unwrap(), "/work/subs/s01.xml");
    }

    #[test]
    fn test_forward_reference_fails() {
        let spec = EditSpec::new()
            .with_variable("subs", "{$root}/subs")
            .with_variable("root", "/work");
        assert!(matches!(
            spec.resolve_variables(),
            Err(NitroError::UnresolvedTemplateVariable(name)) if name == "root"
        ));
    }

    #[test]
    fn test_duplicate_variable() {
        let spec = EditSpec::new().with_variable("a", "x").with_variable("a", "y");
        assert!(matches!(
            spec.resolve_variables(),
            Err(NitroError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_expand_plain_and_multiple() {
        let vars = EditSpec::new()
            .with_variable("a", "1")
            .with_variable("b", "2")
            .resolve_variables()
            .unwrap();
        assert_eq!(vars.expand("no placeholders").unwrap(), "no placeholders");
        assert_eq!(vars.expand("{$a}-{$b}-{$a}").unwrap(), "1-2-1");
        // Not a placeholder
        assert_eq!(vars.expand("{a}/$b").unwrap(), "{a}/$b");
    }

    #[test]
    fn test_unknown_in_file_edit() {
        let spec = EditSpec::new()
            .with_variable("dir", "/in")
            .with_file("/game.nds/data/a", ["{$dir}/a.bin", "{$missing}/b.bin"]);
        let vars = spec.resolve_variables().unwrap();
        let err = vars.resolve_paths(&spec.files[0]).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, NitroError::UnresolvedTemplateVariable(name) if name == "missing"));
    }

    #[test]
    fn test_from_toml() {
        let spec = EditSpec::from_toml_str(
            r#"
            [[variables]]
            name = "root"
            location = "/home/user"

            [[files]]
            path = "/game.nds/data/a"
            imports = ["{$root}/a.bin"]

            [[files]]
            path = "/game.nds/data/b"
            "#,
        )
        .unwrap();

        let vars = spec.resolve_variables().unwrap();
        assert_eq!(
            vars.resolve_paths(&spec.files[0]).unwrap(),
            vec![PathBuf::from("/home/user/a.bin")]
        );
        assert!(spec.files[1].imports.is_empty());
    }

    #[test]
    fn test_from_json() {
        let spec = EditSpec::from_json_str(
            r#"{"files": [{"path": "/rom/x", "imports": ["x.bin"]}]}"#,
        )
        .unwrap();
        assert!(spec.variables.is_empty());
        assert_eq!(spec.files[0].imports, vec!["x.bin".to_string()]);
    }
}
