//! Storage locations: a directory, or a memory namespace.
//!
//! All files of one store live directly inside its location:
//!
//! ```text
//! <location>/
//! ├─ tdb.lock          # Owning process id (advisory)
//! ├─ SPO.idn, SPO.dat  # B+Tree nodes and records
//! ├─ nodes.dat         # Node data
//! ├─ *.info            # Metadata properties
//! └─ journal.jrnl      # Journal
//! ```

use crate::error::{CoreError, CoreResult};
use crate::lock::LocationLock;
use crate::names::{self, MEM_LOCATION};
use crate::process::{ProcessProbe, SystemProbe};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_UNIQUE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Kind {
    /// Canonical absolute directory.
    Dir(PathBuf),
    /// Named memory location; equal to any other with the same name.
    MemNamed(String),
    /// Memory location equal only to itself and its clones.
    MemUnique(u64),
}

/// The root directory (or memory namespace) of a set of storage files.
///
/// Two directory locations are equal when their canonical paths are equal.
/// A location made by [`Location::mem`] is unique: it is equal to its own
/// clones and to nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    kind: Kind,
}

impl Location {
    /// Returns the location of directory `path`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or `path` is not
    /// a directory.
    pub fn create(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| CoreError::io(path, e))?;
            debug!(path = %path.display(), "created location directory");
        }
        Self::existing(path)
    }

    /// Returns the location of an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or is not a directory.
    pub fn existing(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "location is not a directory: {}",
                path.display()
            )));
        }
        let canonical = fs::canonicalize(path).map_err(|e| CoreError::io(path, e))?;
        Ok(Self {
            kind: Kind::Dir(canonical),
        })
    }

    /// Returns a fresh, unique memory location.
    #[must_use]
    pub fn mem() -> Self {
        Self {
            kind: Kind::MemUnique(NEXT_UNIQUE.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Returns the memory location called `name`.
    #[must_use]
    pub fn mem_named(name: impl Into<String>) -> Self {
        Self {
            kind: Kind::MemNamed(name.into()),
        }
    }

    /// Returns true for memory locations.
    #[must_use]
    pub fn is_mem(&self) -> bool {
        !matches!(self.kind, Kind::Dir(_))
    }

    /// Returns true for unique memory locations.
    #[must_use]
    pub fn is_mem_unique(&self) -> bool {
        matches!(self.kind, Kind::MemUnique(_))
    }

    /// Returns the canonical directory, or `None` for memory locations.
    #[must_use]
    pub fn directory_path(&self) -> Option<&Path> {
        match &self.kind {
            Kind::Dir(path) => Some(path),
            Kind::MemNamed(_) | Kind::MemUnique(_) => None,
        }
    }

    /// Returns the path of `filename` inside this location.
    #[must_use]
    pub fn path(&self, filename: &str) -> Option<PathBuf> {
        self.directory_path().map(|dir| dir.join(filename))
    }

    /// Returns the path of `filename.ext` inside this location.
    #[must_use]
    pub fn path_ext(&self, filename: &str, ext: &str) -> Option<PathBuf> {
        self.path(&names::with_ext(filename, ext))
    }

    /// Returns true if `filename` exists in this location.
    #[must_use]
    pub fn exists(&self, filename: &str) -> bool {
        self.path(filename).is_some_and(|p| p.exists())
    }

    /// Returns true if the location itself exists. Memory locations always do.
    #[must_use]
    pub fn exists_dir(&self) -> bool {
        self.directory_path().map_or(true, Path::is_dir)
    }

    /// Returns the child location `name`, creating its directory if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a plain relative path, or the
    /// directory cannot be created.
    pub fn sub_location(&self, name: &str) -> CoreResult<Self> {
        let relative = Path::new(name);
        let plain = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(CoreError::invalid_operation(format!(
                "invalid sub-location name {name:?}"
            )));
        }
        match &self.kind {
            Kind::Dir(dir) => Self::create(dir.join(relative)),
            Kind::MemNamed(parent) => Ok(Self::mem_named(format!("{parent}/{name}"))),
            Kind::MemUnique(_) => Ok(Self::mem()),
        }
    }

    /// Returns the advisory lock of this location, probing the real
    /// operating system for process liveness.
    #[must_use]
    pub fn lock(&self) -> LocationLock {
        LocationLock::new(self.clone(), Arc::new(SystemProbe))
    }

    /// Returns the advisory lock of this location using `probe`.
    #[must_use]
    pub fn lock_with(&self, probe: Arc<dyn ProcessProbe>) -> LocationLock {
        LocationLock::new(self.clone(), probe)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Dir(path) => write!(f, "{}", path.display()),
            Kind::MemNamed(name) => write!(f, "{MEM_LOCATION}/{name}"),
            Kind::MemUnique(token) => write!(f, "{MEM_LOCATION}#{token}"),
        }
    }
}
