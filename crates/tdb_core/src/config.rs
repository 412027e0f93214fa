//! Storage configuration.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::str::FromStr;
use tdb_storage::{CopyMode, DEFAULT_BLOCK_SIZE, SEGMENT_SIZE};

/// Environment variable selecting the file mode.
pub const ENV_FILE_MODE: &str = "TDB_FILE_MODE";

/// Environment variable overriding the block size.
pub const ENV_BLOCK_SIZE: &str = "TDB_BLOCK_SIZE";

/// How block files are accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Positioned reads and writes, one per block.
    Direct,
    /// Memory-mapped segments.
    Mapped,
}

impl FileMode {
    /// Mapped on 64-bit targets, where address space is plentiful.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(target_pointer_width = "64") {
            Self::Mapped
        } else {
            Self::Direct
        }
    }
}

impl Default for FileMode {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl FromStr for FileMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "mapped" => Ok(Self::Mapped),
            other => Err(CoreError::invalid_config(format!(
                "unknown file mode {other:?} (expected \"direct\" or \"mapped\")"
            ))),
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "direct",
            Self::Mapped => "mapped",
        })
    }
}

/// Configuration for opening storage.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Block size in bytes for block files.
    pub block_size: usize,

    /// Access mode for block files.
    pub file_mode: FileMode,

    /// Copy semantics of in-memory block stores.
    pub copy_mode: CopyMode,

    /// Whether to create a location directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            file_mode: FileMode::platform_default(),
            copy_mode: CopyMode::Copy,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the defaults overridden by `TDB_FILE_MODE` and
    /// `TDB_BLOCK_SIZE` when set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if a variable has an invalid
    /// value.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`StoreConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if a variable has an invalid
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let mut config = Self::default();
        if let Some(mode) = lookup(ENV_FILE_MODE) {
            config.file_mode = mode.parse()?;
        }
        if let Some(size) = lookup(ENV_BLOCK_SIZE) {
            config.block_size = size.trim().parse().map_err(|_| {
                CoreError::invalid_config(format!("{ENV_BLOCK_SIZE}={size} is not a number"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the block size.
    #[must_use]
    pub const fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the file mode.
    #[must_use]
    pub const fn file_mode(mut self, mode: FileMode) -> Self {
        self.file_mode = mode;
        self
    }

    /// Sets the copy mode of in-memory block stores.
    #[must_use]
    pub const fn copy_mode(mut self, mode: CopyMode) -> Self {
        self.copy_mode = mode;
        self
    }

    /// Sets whether to create missing location directories.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Checks that the block size is usable in every file mode.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the block size is zero or
    /// does not divide the segment size.
    pub fn validate(&self) -> CoreResult<()> {
        if self.block_size == 0 || SEGMENT_SIZE % self.block_size != 0 {
            return Err(CoreError::invalid_config(format!(
                "block size {} must be non-zero and divide the segment size {SEGMENT_SIZE}",
                self.block_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.block_size, 8192);
        assert_eq!(config.copy_mode, CopyMode::Copy);
        assert!(config.create_if_missing);
        config.validate().unwrap();
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .block_size(4096)
            .file_mode(FileMode::Direct)
            .copy_mode(CopyMode::Share)
            .create_if_missing(false);

        assert_eq!(config.block_size, 4096);
        assert_eq!(config.file_mode, FileMode::Direct);
        assert_eq!(config.copy_mode, CopyMode::Share);
        assert!(!config.create_if_missing);
    }

    #[test]
    fn file_mode_parses() {
        assert_eq!("direct".parse::<FileMode>().unwrap(), FileMode::Direct);
        assert_eq!(" Mapped ".parse::<FileMode>().unwrap(), FileMode::Mapped);
        assert!("mmap".parse::<FileMode>().is_err());
        assert_eq!(FileMode::Mapped.to_string(), "mapped");
    }

    #[test]
    fn environment_overrides() {
        let config =
            StoreConfig::from_lookup(lookup(&[("TDB_FILE_MODE", "direct"), ("TDB_BLOCK_SIZE", "1024")]))
                .unwrap();
        assert_eq!(config.file_mode, FileMode::Direct);
        assert_eq!(config.block_size, 1024);

        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn invalid_environment_is_rejected() {
        assert!(StoreConfig::from_lookup(lookup(&[("TDB_BLOCK_SIZE", "big")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("TDB_BLOCK_SIZE", "3000")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("TDB_FILE_MODE", "fast")])).is_err());
    }
}
