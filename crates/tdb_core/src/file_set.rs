//! A group of files sharing one base name in a location.

use crate::error::CoreResult;
use crate::location::Location;
use crate::meta_file::MetaFile;
use crate::names::{self, EXT_META};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Files `basename.<ext>` of one index or table, plus their metadata in
/// `basename.info`.
///
/// Clones share the same metadata instance.
#[derive(Debug, Clone)]
pub struct FileSet {
    location: Location,
    basename: String,
    meta: Arc<Mutex<Option<Arc<MetaFile>>>>,
}

impl FileSet {
    /// Creates the file set `basename` in `location`.
    #[must_use]
    pub fn new(location: Location, basename: impl Into<String>) -> Self {
        Self {
            location,
            basename: basename.into(),
            meta: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the location.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Returns the base name.
    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Returns true if the location is in memory.
    #[must_use]
    pub fn is_mem(&self) -> bool {
        self.location.is_mem()
    }

    /// Returns the path of `basename.ext`, or `None` in memory.
    #[must_use]
    pub fn filename(&self, ext: &str) -> Option<PathBuf> {
        self.location.path_ext(&self.basename, ext)
    }

    /// Returns a label for `basename.ext` usable in messages, also for memory
    /// locations.
    #[must_use]
    pub fn label(&self, ext: &str) -> String {
        match self.filename(ext) {
            Some(path) => path.display().to_string(),
            None => format!("{}/{}", self.location, names::with_ext(&self.basename, ext)),
        }
    }

    /// Returns true if `basename.ext` exists on disk.
    #[must_use]
    pub fn exists(&self, ext: &str) -> bool {
        self.location.exists(&names::with_ext(&self.basename, ext))
    }

    /// Returns true if the metadata file exists on disk.
    #[must_use]
    pub fn exists_meta(&self) -> bool {
        self.exists(EXT_META)
    }

    /// Returns the metadata, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing metadata file cannot be read.
    pub fn meta_file(&self) -> CoreResult<Arc<MetaFile>> {
        let mut slot = self.meta.lock();
        if let Some(meta) = slot.as_ref() {
            return Ok(Arc::clone(meta));
        }
        let meta = match self.filename(EXT_META) {
            Some(path) => MetaFile::open(&self.basename, &path)?,
            None => MetaFile::in_memory(&self.basename),
        };
        let meta = Arc::new(meta);
        *slot = Some(Arc::clone(&meta));
        Ok(meta)
    }

    /// Returns a metadata property.
    ///
    /// # Errors
    ///
    /// Same as [`FileSet::meta_file`].
    pub fn property(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.meta_file()?.property(key))
    }

    /// Sets a metadata property (not yet flushed).
    ///
    /// # Errors
    ///
    /// Same as [`FileSet::meta_file`].
    pub fn set_property(&self, key: &str, value: impl Into<String>) -> CoreResult<()> {
        self.meta_file()?.set_property(key, value);
        Ok(())
    }

    /// Flushes metadata changes, if the metadata was ever opened.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the metadata file cannot be written.
    pub fn flush_meta(&self) -> CoreResult<()> {
        let meta = self.meta.lock().clone();
        match meta {
            Some(meta) => meta.flush(),
            None => Ok(()),
        }
    }
}

impl fmt::Display for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSet[{}:{}]", self.location, self.basename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn filenames_in_directory() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        let fs = FileSet::new(loc, "SPO");

        let idn = fs.filename("idn").unwrap();
        assert_eq!(idn.file_name().unwrap(), "SPO.idn");
        assert!(!fs.exists("idn"));
        std::fs::write(&idn, b"").unwrap();
        assert!(fs.exists("idn"));
    }

    #[test]
    fn metadata_is_shared_and_persisted() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        let fs = FileSet::new(loc.clone(), "nodes");
        let copy = fs.clone();

        fs.set_property("k", "v").unwrap();
        assert_eq!(copy.property("k").unwrap().as_deref(), Some("v"));
        assert!(!fs.exists_meta());

        fs.flush_meta().unwrap();
        assert!(fs.exists_meta());

        let reopened = FileSet::new(loc, "nodes");
        assert_eq!(reopened.property("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn memory_file_set_has_no_files() {
        let fs = FileSet::new(Location::mem_named("db"), "SPO");
        assert!(fs.is_mem());
        assert_eq!(fs.filename("idn"), None);
        assert_eq!(fs.label("idn"), "--mem--/db/SPO.idn");
        fs.set_property("k", "v").unwrap();
        fs.flush_meta().unwrap();
    }
}
