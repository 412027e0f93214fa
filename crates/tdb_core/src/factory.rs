//! Opening block stores and channels for file sets.

use crate::config::{FileMode, StoreConfig};
use crate::error::{CoreError, CoreResult};
use crate::file_set::FileSet;
use crate::location::Location;
use crate::names::{self, EXT_JOURNAL, JOURNAL_FILE};
use crate::registry::ChannelRegistry;
use std::path::Path;
use tdb_storage::{
    BlockAccess, BufferChannel, DirectBlockAccess, FileBufferChannel, MappedBlockAccess,
    MemBlockAccess, MemBufferChannel,
};
use tracing::{debug, info};

/// The storage context of one process: configuration plus open files.
///
/// Memory locations get in-memory stores and channels; directory locations
/// get file-backed ones sharing handles through the [`ChannelRegistry`].
#[derive(Debug, Default)]
pub struct FileFactory {
    config: StoreConfig,
    registry: ChannelRegistry,
}

impl FileFactory {
    /// Creates a factory with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: StoreConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: ChannelRegistry::new(),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the registry of open files.
    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Returns the location of directory `path`, creating it if allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing and may not be created,
    /// or cannot be created.
    pub fn location(&self, path: impl AsRef<Path>) -> CoreResult<Location> {
        if self.config.create_if_missing {
            Location::create(path)
        } else {
            Location::existing(path)
        }
    }

    /// Opens the block file `ext` of `file_set`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its length is not a
    /// multiple of the block size.
    pub fn block_access(&self, file_set: &FileSet, ext: &str) -> CoreResult<Box<dyn BlockAccess>> {
        let block_size = self.config.block_size;
        let Some(path) = file_set.filename(ext) else {
            let label = file_set.label(ext);
            debug!(label = %label, "opening memory block store");
            return Ok(Box::new(MemBlockAccess::new(
                label,
                block_size,
                self.config.copy_mode,
            )?));
        };
        let file = self.registry.acquire(&path)?;
        debug!(path = %path.display(), mode = %self.config.file_mode, block_size, "opening block store");
        let access: Box<dyn BlockAccess> = match self.config.file_mode {
            FileMode::Direct => Box::new(DirectBlockAccess::from_file(file, block_size)?),
            FileMode::Mapped => Box::new(MappedBlockAccess::from_file(file, block_size)?),
        };
        Ok(access)
    }

    /// Opens the variable-length file `ext` of `file_set`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn buffer_channel(
        &self,
        file_set: &FileSet,
        ext: &str,
    ) -> CoreResult<Box<dyn BufferChannel>> {
        match file_set.filename(ext) {
            Some(path) => {
                let file = self.registry.acquire(&path)?;
                Ok(Box::new(FileBufferChannel::from_file(file)))
            }
            None => Ok(Box::new(MemBufferChannel::new(file_set.label(ext)))),
        }
    }

    /// Opens the journal of `location`. Only one journal channel per
    /// location may be open at a time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChannelInUse`] if the journal is already open.
    pub fn journal_channel(&self, location: &Location) -> CoreResult<Box<dyn BufferChannel>> {
        match location.path_ext(JOURNAL_FILE, EXT_JOURNAL) {
            Some(path) => {
                let file = self.registry.acquire_exclusive(&path)?;
                Ok(Box::new(FileBufferChannel::from_file(file)))
            }
            None => Ok(Box::new(MemBufferChannel::new(format!(
                "{location}/{}",
                names::with_ext(JOURNAL_FILE, EXT_JOURNAL)
            )))),
        }
    }

    /// Releases the journal of `location` so it can be opened again.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the journal is not open.
    pub fn release_journal(&self, location: &Location) -> CoreResult<()> {
        match location.path_ext(JOURNAL_FILE, EXT_JOURNAL) {
            Some(path) if !self.registry.release(&path) => Err(CoreError::invalid_operation(
                format!("journal of {location} is not open"),
            )),
            _ => Ok(()),
        }
    }

    /// Syncs and forgets every open file.
    ///
    /// # Errors
    ///
    /// Returns the first sync failure.
    pub fn close(&self) -> CoreResult<()> {
        let open = self.registry.open_count();
        self.registry.release_all()?;
        info!(files = open, "closed file factory");
        Ok(())
    }
}
