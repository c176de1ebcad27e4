use super::Format;
use crate::error::{NitroError, Result};
use crate::io::ByteView;
use crate::vfs::GameFile;
use std::io::Write;

/// Opaque codec: the external form is the raw content itself.
///
/// Import swaps the content for the first external source, export dumps
/// the current content to the first sink.
#[derive(Debug, Default)]
pub struct Replace {
    data: Option<ByteView>,
}

impl Replace {
    pub const FORMAT_NAME: &'static str = "Common.Replace";

    pub fn new() -> Self {
        Self::default()
    }

    fn current<'a>(&'a self, file: Option<&'a GameFile>) -> Result<&'a ByteView> {
        self.data
            .as_ref()
            .or_else(|| file.map(GameFile::data))
            .ok_or_else(|| NitroError::InvalidSpec("Common.Replace used before read".into()))
    }
}

impl Format for Replace {
    fn format_name(&self) -> &str {
        Self::FORMAT_NAME
    }

    fn read(&mut self, file: &mut GameFile) -> Result<()> {
        self.data = Some(file.data().clone());
        Ok(())
    }

    fn write(&mut self, file: &GameFile, out: &mut dyn Write) -> Result<()> {
        self.current(Some(file))?.write_to(out)
    }

    fn import(&mut self, sources: &[ByteView]) -> Result<()> {
        let source = sources.first().ok_or_else(|| {
            NitroError::InvalidSpec("Common.Replace needs one import source".into())
        })?;
        self.data = Some(source.clone());
        Ok(())
    }

    fn export(&mut self, sinks: &mut [&mut dyn Write]) -> Result<()> {
        let data = self.current(None)?.clone();
        match sinks.first_mut() {
            Some(sink) => data.write_to(&mut **sink),
            None => Err(NitroError::InvalidSpec(
                "Common.Replace needs one export sink".into(),
            )),
        }
    }
}
