//! Error types for cartridge operations

use thiserror::Error;

/// Direction of a codec transformation between the image and external files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Import,
    Export,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Import => f.write_str("import"),
            Direction::Export => f.write_str("export"),
        }
    }
}

/// Cartridge toolkit errors
#[derive(Error, Debug)]
pub enum NitroError {
    /// Virtual path does not resolve
    #[error("Path not found in container tree: {0}")]
    NotFound(String),

    /// Codec lacks the requested direction
    #[error("Format {format} does not support {direction}")]
    UnsupportedDirection {
        format: String,
        direction: Direction,
    },

    /// Image structure is inconsistent
    #[error("Malformed image layout: {0}")]
    MalformedLayout(String),

    /// Codec rejected the imported sources
    #[error("Import of {path} failed: {source}")]
    ImportFailure {
        path: String,
        #[source]
        source: Box<NitroError>,
    },

    /// `{$name}` with no matching variable
    #[error("Unresolved template variable: {0}")]
    UnresolvedTemplateVariable(String),

    /// Format name not in the registry
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// Codec call on a file with no format
    #[error("No format assigned to {0}")]
    NoFormat(String),

    /// Write ordering loops back on itself
    #[error("Dependency cycle detected at {0}")]
    DependencyCycle(String),

    /// Name does not fit the name table
    #[error("Invalid entry name: {0}")]
    InvalidName(String),

    /// Capacity not representable in the header
    #[error("Invalid cartridge size: {0} (must be a power of two >= 128 KiB)")]
    InvalidCartridgeSize(u64),

    /// Project or edit file is invalid
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Regex compile error
    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),
}

impl NitroError {
    /// Shorthand for an `UnsupportedDirection` error.
    pub fn unsupported(format: impl Into<String>, direction: Direction) -> Self {
        NitroError::UnsupportedDirection {
            format: format.into(),
            direction,
        }
    }

    /// Shorthand for a `MalformedLayout` error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        NitroError::MalformedLayout(msg.into())
    }

    /// True when a codec merely lacks the requested direction.
    pub fn is_unsupported(&self) -> bool {
        match self {
            NitroError::UnsupportedDirection { .. } => true,
            NitroError::ImportFailure { source, .. } => source.is_unsupported(),
            _ => false,
        }
    }

    /// True for errors that leave the tree or the batch inconsistent.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NitroError::NotFound(_)
                | NitroError::MalformedLayout(_)
                | NitroError::DependencyCycle(_)
        )
    }
}

/// Toolkit result type
pub type Result<T> = std::result::Result<T, NitroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_is_recoverable() {
        let err = NitroError::unsupported("Common.Replace", Direction::Export);
        assert!(err.is_unsupported());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Format Common.Replace does not support export");
    }

    #[test]
    fn test_wrapped_unsupported() {
        let err = NitroError::ImportFailure {
            path: "/rom.nds/data/a".into(),
            source: Box::new(NitroError::unsupported("Nitro.ROM", Direction::Import)),
        };
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(NitroError::NotFound("/x".into()).is_fatal());
        assert!(NitroError::malformed("bad fat").is_fatal());
        assert!(NitroError::DependencyCycle("/a".into()).is_fatal());
        assert!(!NitroError::UnresolvedTemplateVariable("dir".into()).is_fatal());
    }
}
