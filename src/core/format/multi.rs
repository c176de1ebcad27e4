use super::{Format, FormatRegistry};
use crate::error::{NitroError, Result};
use crate::io::ByteView;
use crate::vfs::GameFile;
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use tracing::debug;

/// One link of the import chain as declared in the project specification
#[derive(Debug, Clone, Deserialize)]
pub struct StageSpec {
    /// Codec name in the registry
    pub name: String,
    #[serde(default)]
    pub params: Value,
    /// Indices of the import sources handed to this stage
    #[serde(default)]
    pub streams: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct MultiTypeParams {
    #[serde(default)]
    import: Vec<StageSpec>,
}

struct Stage {
    name: String,
    format: Box<dyn Format>,
    streams: Vec<usize>,
}

/// Chain of codecs applied in sequence on import.
///
/// Each stage decodes the output of the previous one, imports its share of
/// the external sources and re-encodes. Export is not supported.
#[derive(Default)]
pub struct MultiType {
    name: String,
    data: Option<ByteView>,
    stages: Vec<Stage>,
}

impl MultiType {
    pub const FORMAT_NAME: &'static str = "Common.MultiType";

    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the configured stages in order
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }
}

impl Format for MultiType {
    fn format_name(&self) -> &str {
        Self::FORMAT_NAME
    }

    fn initialize(&mut self, params: &Value, registry: &FormatRegistry) -> Result<()> {
        let parsed: MultiTypeParams = if params.is_null() {
            MultiTypeParams::default()
        } else {
            serde_json::from_value(params.clone())?
        };

        self.stages = parsed
            .import
            .into_iter()
            .map(|spec| {
                Ok(Stage {
                    format: registry.create_with(&spec.name, &spec.params)?,
                    name: spec.name,
                    streams: spec.streams,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn read(&mut self, file: &mut GameFile) -> Result<()> {
        self.name = file.name().to_string();
        self.data = Some(file.data().clone());
        Ok(())
    }

    fn write(&mut self, file: &GameFile, out: &mut dyn Write) -> Result<()> {
        match &self.data {
            Some(data) => data.write_to(out),
            None => file.data().write_to(out),
        }
    }

    fn import(&mut self, sources: &[ByteView]) -> Result<()> {
        let mut data = self
            .data
            .clone()
            .ok_or_else(|| NitroError::InvalidSpec("Common.MultiType used before read".into()))?;

        for stage in &mut self.stages {
            let selected = stage
                .streams
                .iter()
                .map(|&idx| {
                    sources.get(idx).cloned().ok_or_else(|| {
                        NitroError::InvalidSpec(format!(
                            "stage {} wants source {} of {}",
                            stage.name,
                            idx,
                            sources.len()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            debug!(
                "Running stage {} on {} with {} sources",
                stage.name,
                self.name,
                selected.len()
            );

            let mut scratch = GameFile::new(self.name.clone(), data);
            stage.format.read(&mut scratch)?;
            stage.format.import(&selected)?;

            let mut buffer = Vec::new();
            stage.format.write(&scratch, &mut buffer)?;
            data = ByteView::from_vec(buffer);
        }

        self.data = Some(data);
        Ok(())
    }
}
