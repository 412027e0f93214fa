//! Open file handles shared between block stores and channels.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tdb_storage::FileBase;
use tracing::{debug, warn};

#[derive(Debug)]
struct Entry {
    file: Arc<FileBase>,
    exclusive: bool,
}

/// Maps file paths to the single open handle for each file.
///
/// Every store and channel over the same path shares one [`FileBase`].
/// A file acquired exclusively (a journal) cannot be acquired again until
/// it is released.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    open: Mutex<HashMap<PathBuf, Entry>>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared handle for `path`, opening the file on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChannelInUse`] if the file is held exclusively,
    /// or an error if it cannot be opened.
    pub fn acquire(&self, path: &Path) -> CoreResult<Arc<FileBase>> {
        let mut open = self.open.lock();
        if let Some(entry) = open.get(path) {
            if entry.exclusive {
                warn!(path = %path.display(), "refusing to share an exclusively open file");
                return Err(CoreError::ChannelInUse {
                    path: path.to_path_buf(),
                });
            }
            return Ok(Arc::clone(&entry.file));
        }
        let file = Arc::new(FileBase::open(path)?);
        debug!(path = %path.display(), "opened file");
        open.insert(
            path.to_path_buf(),
            Entry {
                file: Arc::clone(&file),
                exclusive: false,
            },
        );
        Ok(file)
    }

    /// Opens `path` for a single user.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChannelInUse`] if the file is already open
    /// through this registry, or an error if it cannot be opened.
    pub fn acquire_exclusive(&self, path: &Path) -> CoreResult<Arc<FileBase>> {
        let mut open = self.open.lock();
        if open.contains_key(path) {
            warn!(path = %path.display(), "file already open, refusing exclusive open");
            return Err(CoreError::ChannelInUse {
                path: path.to_path_buf(),
            });
        }
        let file = Arc::new(FileBase::open(path)?);
        debug!(path = %path.display(), "opened file exclusively");
        open.insert(
            path.to_path_buf(),
            Entry {
                file: Arc::clone(&file),
                exclusive: true,
            },
        );
        Ok(file)
    }

    /// Forgets `path`. The file closes once the last user drops its handle.
    ///
    /// Returns true if the path was open.
    pub fn release(&self, path: &Path) -> bool {
        let removed = self.open.lock().remove(path);
        if let Some(entry) = &removed {
            let users = Arc::strong_count(&entry.file);
            if users > 1 {
                debug!(path = %path.display(), users = users - 1, "released file still in use");
            }
        }
        removed.is_some()
    }

    /// Syncs and forgets every open file.
    ///
    /// All files are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first sync error.
    pub fn release_all(&self) -> CoreResult<()> {
        let drained: Vec<(PathBuf, Entry)> = self.open.lock().drain().collect();
        let mut first = None;
        for (path, entry) in drained {
            if let Err(e) = entry.file.sync() {
                warn!(path = %path.display(), error = %e, "sync on release failed");
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Returns true if `path` is open through this registry.
    #[must_use]
    pub fn is_open(&self, path: &Path) -> bool {
        self.open.lock().contains_key(path)
    }

    /// Returns the number of open files.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreErrorKind;
    use tempfile::tempdir;

    #[test]
    fn shared_acquire_returns_same_handle() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("SPO.dat");
        let registry = ChannelRegistry::new();

        let a = registry.acquire(&path).unwrap();
        let b = registry.acquire(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.is_open(&path));
        assert_eq!(registry.open_count(), 1);

        assert!(registry.release(&path));
        assert!(!registry.release(&path));
        assert!(!registry.is_open(&path));
    }

    #[test]
    fn exclusive_refuses_second_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("journal.jrnl");
        let registry = ChannelRegistry::new();

        let _journal = registry.acquire_exclusive(&path).unwrap();
        let err = registry.acquire_exclusive(&path).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Usage);
        assert!(registry.acquire(&path).is_err());

        registry.release(&path);
        registry.acquire_exclusive(&path).unwrap();
    }

    #[test]
    fn release_all_empties_registry() {
        let temp = tempdir().unwrap();
        let registry = ChannelRegistry::new();
        registry.acquire(&temp.path().join("a")).unwrap();
        registry.acquire(&temp.path().join("b")).unwrap();

        registry.release_all().unwrap();
        assert_eq!(registry.open_count(), 0);
    }
}
