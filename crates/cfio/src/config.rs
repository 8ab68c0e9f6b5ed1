//! Cached-file configuration.
//!
//! The protocol recognizes a single option, `buf_size`: the size in bytes of
//! the transfer buffer each handle allocates at open. `0` disables buffering.
//!
//! Configuration is validated when it is built, whether from code, from
//! name/value pairs, or from a TOML document:
//!
//! ```toml
//! buf_size = 65536
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CfError, CfResult};

/// Default transfer buffer size (1 MiB).
pub const DEFAULT_BUF_SIZE: usize = 1 << 20;

/// Largest accepted transfer buffer size.
pub const MAX_BUF_SIZE: usize = i32::MAX as usize;

/// Name of the buffer size option.
pub const BUF_SIZE_OPTION: &str = "buf_size";

/// Options for the `cf` protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CachedFileConfig {
    buf_size: usize,
}

impl Default for CachedFileConfig {
    fn default() -> Self {
        Self {
            buf_size: DEFAULT_BUF_SIZE,
        }
    }
}

/// On-disk shape. Integers stay signed so negative values get a clear error.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    buf_size: Option<i64>,
}

impl CachedFileConfig {
    /// Create a config with the given buffer size.
    pub fn new(buf_size: usize) -> CfResult<Self> {
        if buf_size > MAX_BUF_SIZE {
            return Err(CfError::invalid_option(
                BUF_SIZE_OPTION,
                format!("{buf_size} exceeds maximum {MAX_BUF_SIZE}"),
            ));
        }
        Ok(Self { buf_size })
    }

    /// Config with buffering disabled.
    pub fn unbuffered() -> Self {
        Self { buf_size: 0 }
    }

    /// Transfer buffer size in bytes. `0` means unbuffered.
    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    /// Set an option by name from its string value.
    pub fn set_option(&mut self, name: &str, value: &str) -> CfResult<()> {
        match name {
            BUF_SIZE_OPTION => {
                let n: i64 = value.trim().parse().map_err(|e| {
                    CfError::invalid_option(name, format!("{value:?} is not an integer: {e}"))
                })?;
                *self = Self::from_signed(n)?;
                Ok(())
            }
            _ => Err(CfError::invalid_option(name, "unknown option")),
        }
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> CfResult<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| CfError::Config(e.to_string()))?;
        match file.buf_size {
            Some(n) => Self::from_signed(n),
            None => Ok(Self::default()),
        }
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> CfResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    fn from_signed(n: i64) -> CfResult<Self> {
        let size = usize::try_from(n)
            .map_err(|_| CfError::invalid_option(BUF_SIZE_OPTION, format!("{n} is negative")))?;
        Self::new(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_one_mebibyte() {
        assert_eq!(CachedFileConfig::default().buf_size(), 1_048_576);
    }

    #[test]
    fn test_new_rejects_oversize() {
        assert!(CachedFileConfig::new(MAX_BUF_SIZE).is_ok());
        let err = CachedFileConfig::new(MAX_BUF_SIZE + 1).unwrap_err();
        assert!(matches!(err, CfError::InvalidOption { .. }));
    }

    #[test]
    fn test_set_option() {
        let mut config = CachedFileConfig::default();
        config.set_option("buf_size", "4096").unwrap();
        assert_eq!(config.buf_size(), 4096);

        config.set_option("buf_size", "0").unwrap();
        assert_eq!(config, CachedFileConfig::unbuffered());
    }

    #[test]
    fn test_set_option_rejects_bad_values() {
        let mut config = CachedFileConfig::default();
        assert!(config.set_option("buf_size", "-1").is_err());
        assert!(config.set_option("buf_size", "lots").is_err());
        assert!(config.set_option("block_size", "10").is_err());
        // Failed sets leave the config untouched
        assert_eq!(config.buf_size(), DEFAULT_BUF_SIZE);
    }

    #[test]
    fn test_from_toml() {
        let config = CachedFileConfig::from_toml_str("buf_size = 8192\n").unwrap();
        assert_eq!(config.buf_size(), 8192);

        let config = CachedFileConfig::from_toml_str("").unwrap();
        assert_eq!(config, CachedFileConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_unknown_and_negative() {
        assert!(matches!(
            CachedFileConfig::from_toml_str("bufsize = 1"),
            Err(CfError::Config(_))
        ));
        assert!(matches!(
            CachedFileConfig::from_toml_str("buf_size = -5"),
            Err(CfError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cfio.toml");
        std::fs::write(&path, "buf_size = 0").unwrap();
        assert_eq!(CachedFileConfig::load(&path).unwrap().buf_size(), 0);
    }
}
