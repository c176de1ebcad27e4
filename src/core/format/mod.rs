//! Codec contract
//!
//! A [`Format`] translates one [`GameFile`] between its packed in-image
//! bytes and its editable external representation. Codecs are bound to a
//! file by name through the [`FormatRegistry`] and are driven by the file
//! itself (`GameFile::read_format`, `GameFile::write_format`, ...), which
//! lends itself to the codec for the duration of the call.

mod multi;
mod registry;
mod replace;

pub use multi::MultiType;
pub use registry::{FormatFactory, FormatRegistry};
pub use replace::Replace;

use crate::error::{Direction, NitroError, Result};
use crate::io::ByteView;
use crate::vfs::GameFile;
use serde_json::Value;
use std::io::Write;

pub trait Format {
    /// Registry name, e.g. `Nitro.ROM`
    fn format_name(&self) -> &str;

    /// Apply codec parameters from the project specification
    fn initialize(&mut self, _params: &Value, _registry: &FormatRegistry) -> Result<()> {
        Ok(())
    }

    /// Decode the file content. Container codecs attach the unpacked
    /// subtree to `file`.
    fn read(&mut self, file: &mut GameFile) -> Result<()>;

    /// Encode the decoded state into `out`
    fn write(&mut self, file: &GameFile, out: &mut dyn Write) -> Result<()>;

    /// Replace the decoded state with external sources
    fn import(&mut self, _sources: &[ByteView]) -> Result<()> {
        Err(NitroError::unsupported(self.format_name(), Direction::Import))
    }

    /// Produce external representations of the decoded state
    fn export(&mut self, _sinks: &mut [&mut dyn Write]) -> Result<()> {
        Err(NitroError::unsupported(self.format_name(), Direction::Export))
    }
}

/// Read a boolean codec parameter, falling back to `default`
pub(crate) fn bool_param(params: &Value, key: &str, default: bool) -> Result<bool> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(value)) => Ok(*value),
        Some(other) => Err(NitroError::InvalidSpec(format!(
            "parameter {} must be a boolean, got {}",
            key, other
        ))),
    }
}
