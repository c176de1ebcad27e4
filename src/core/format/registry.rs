//! Name to codec factory map

use super::{Format, MultiType, Replace};
use crate::error::{NitroError, Result};
use crate::nitro::Rom;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Constructor for a fresh, uninitialized codec
pub type FormatFactory = Box<dyn Fn() -> Box<dyn Format> + Send + Sync>;

/// Statically populated registry of codecs, looked up by format name
pub struct FormatRegistry {
    factories: BTreeMap<String, FormatFactory>,
}

impl FormatRegistry {
    /// Empty registry
    pub fn new() -> Self {
        FormatRegistry {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the codecs shipped in this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Rom::FORMAT_NAME, || Box::new(Rom::new()));
        registry.register(Replace::FORMAT_NAME, || Box::new(Replace::new()));
        registry.register(MultiType::FORMAT_NAME, || Box::new(MultiType::new()));
        registry
    }

    /// Add or replace a factory
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Format> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering format {}", name);
        self.factories.insert(name, Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate a codec by name
    pub fn create(&self, name: &str) -> Result<Box<dyn Format>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| NitroError::UnknownFormat(name.to_string()))?;
        Ok(factory())
    }

    /// Instantiate a codec and apply its parameters
    pub fn create_with(&self, name: &str, params: &Value) -> Result<Box<dyn Format>> {
        let mut format = self.create(name)?;
        format.initialize(params, self)?;
        Ok(format)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
