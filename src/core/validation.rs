//! Validation for entry names, virtual paths and codec names
//!
//! Names end up length-prefixed in the file name table, so they are held to
//! the on-disk limits before anything is encoded.

use crate::error::{NitroError, Result};
use crate::vfs::PATH_SEPARATOR;
use regex::Regex;

/// Longest name a name-table entry can carry (7-bit length)
pub const MAX_NAME_LENGTH: usize = 0x7F;

/// A validated file or folder name
///
/// # Rules
/// - Length: 1-127 bytes
/// - No `/` and no NUL byte
/// - Not `.` or `..`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryName(String);

impl EntryName {
    /// Create a new validated name
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the name doesn't meet the rules above.
    ///
    /// # Examples
    ///
    /// ```
    /// use nitro_modkit::core::validation::EntryName;
    ///
    /// let name = EntryName::new("map01.bin").unwrap();
    /// assert_eq!(name.as_str(), "map01.bin");
    ///
    /// assert!(EntryName::new("").is_err());
    /// assert!(EntryName::new("a/b").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_entry_name(&name)?;
        Ok(EntryName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for EntryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check a single name against the name-table limits
pub fn validate_entry_name(name: &str) -> Result<()> {
    validate_name_bytes(name.as_bytes())
}

/// Same rules on the bytes a name is stored as, which need not be UTF-8
pub fn validate_name_bytes(raw: &[u8]) -> Result<()> {
    let shown = String::from_utf8_lossy(raw);
    if raw.is_empty() {
        return Err(NitroError::InvalidName("name cannot be empty".to_string()));
    }

    if raw.len() > MAX_NAME_LENGTH {
        return Err(NitroError::InvalidName(format!(
            "name '{}' too long (max {} bytes)",
            shown, MAX_NAME_LENGTH
        )));
    }

    if raw.contains(&(PATH_SEPARATOR as u8)) || raw.contains(&0) {
        return Err(NitroError::InvalidName(format!(
            "name '{}' contains a separator or NUL byte",
            shown
        )));
    }

    if raw == b"." || raw == b".." {
        return Err(NitroError::InvalidName(format!("name '{}' is reserved", shown)));
    }

    Ok(())
}

/// Normalize an absolute virtual path
///
/// Collapses repeated and trailing separators and validates every segment.
///
/// # Examples
///
/// ```
/// use nitro_modkit::core::validation::normalize_virtual_path;
///
/// let path = normalize_virtual_path("//rom.nds/data//a/").unwrap();
/// assert_eq!(path, "/rom.nds/data/a");
///
/// assert!(normalize_virtual_path("rom.nds/data").is_err()); // relative
/// assert!(normalize_virtual_path("/rom.nds/../x").is_err());
/// ```
pub fn normalize_virtual_path(path: &str) -> Result<String> {
    if !path.starts_with(PATH_SEPARATOR) {
        return Err(NitroError::InvalidName(format!(
            "path '{}' must be absolute",
            path
        )));
    }

    let mut normalized = String::with_capacity(path.len());
    for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        validate_entry_name(segment)?;
        normalized.push(PATH_SEPARATOR);
        normalized.push_str(segment);
    }

    if normalized.is_empty() {
        return Err(NitroError::InvalidName("path cannot be the root".to_string()));
    }

    Ok(normalized)
}

/// Check a codec name such as `Nitro.ROM` or `Common.Replace`
pub fn validate_format_name(name: &str) -> Result<()> {
    let re = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$")?;
    if !re.is_match(name) {
        return Err(NitroError::InvalidSpec(format!(
            "format name '{}' must be dot separated identifiers",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(EntryName::new("a").is_ok());
        assert!(EntryName::new("arm9.bin").is_ok());
        assert!(EntryName::new("ドラゴン.dat").is_ok());
        assert!(EntryName::new("x".repeat(127)).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(EntryName::new("").is_err()); // empty
        assert!(EntryName::new("x".repeat(128)).is_err()); // too long
        assert!(EntryName::new("a/b").is_err()); // separator
        assert!(EntryName::new("a\0b").is_err()); // NUL
        assert!(EntryName::new("..").is_err()); // reserved
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_virtual_path("/rom.nds").unwrap(), "/rom.nds");
        assert_eq!(
            normalize_virtual_path("/rom.nds//data/a/").unwrap(),
            "/rom.nds/data/a"
        );
        assert!(normalize_virtual_path("/").is_err());
        assert!(normalize_virtual_path("data/a").is_err());
        assert!(normalize_virtual_path("/data/./a").is_err());
    }

    #[test]
    fn test_format_names() {
        assert!(validate_format_name("Nitro.ROM").is_ok());
        assert!(validate_format_name("Common.Replace").is_ok());
        assert!(validate_format_name("Ninokuni.Text.Subtitle").is_ok());
        assert!(validate_format_name("Replace").is_err());
        assert!(validate_format_name("Common.").is_err());
        assert!(validate_format_name("1Common.Replace").is_err());
    }

    #[test]
    fn test_raw_name_bytes() {
        // Shift-JIS "あ" is not UTF-8 but is a valid stored name
        assert!(validate_name_bytes(&[0x82, 0xA0]).is_ok());
        assert!(validate_name_bytes(&[0x82; 128]).is_err());
        assert!(validate_name_bytes(&[0x82, b'/', 0xA0]).is_err());
        assert!(validate_name_bytes(&[0x82, 0]).is_err());
        assert!(validate_name_bytes(b"..").is_err());
    }
}
