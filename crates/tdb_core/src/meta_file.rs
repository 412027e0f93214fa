//! Key/value metadata persisted as a properties file.
//!
//! The file format is line oriented text:
//!
//! ```text
//! # SPO
//! tdb.bplustree.blksize=8192
//! tdb.bplustree.order=101
//! ```
//!
//! Lines starting with `#` or `!` and blank lines are ignored. The first `=`
//! (or `:`) separates key from value; surrounding whitespace is trimmed.

use crate::error::{CoreError, CoreResult};
use crate::names::EXT_TEMP;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
struct Properties {
    map: BTreeMap<String, String>,
    changed: bool,
}

/// Metadata of one file set.
///
/// Changes are held in memory until [`MetaFile::flush`]. A metadata file
/// without a path (for memory locations) never touches the disk.
#[derive(Debug)]
pub struct MetaFile {
    label: String,
    path: Option<PathBuf>,
    props: Mutex<Properties>,
}

impl MetaFile {
    /// Opens the metadata file at `path`, loading it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing file cannot be read.
    pub fn open(label: impl Into<String>, path: &Path) -> CoreResult<Self> {
        let label = label.into();
        let map = match fs::read_to_string(path) {
            Ok(text) => parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(CoreError::io(path, e)),
        };
        debug!(label = %label, path = %path.display(), properties = map.len(), "opened metadata");
        Ok(Self {
            label,
            path: Some(path.to_path_buf()),
            props: Mutex::new(Properties {
                map,
                changed: false,
            }),
        })
    }

    /// Creates metadata that lives only in memory.
    #[must_use]
    pub fn in_memory(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: None,
            props: Mutex::new(Properties::default()),
        }
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the value of `key`.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        self.props.lock().map.get(key).cloned()
    }

    /// Returns the value of `key`, or `default` if unset.
    #[must_use]
    pub fn property_or(&self, key: &str, default: &str) -> String {
        self.property(key).unwrap_or_else(|| default.to_string())
    }

    /// Returns the value of `key` as an integer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMetadata`] if the value is not an integer.
    pub fn property_as_int(&self, key: &str) -> CoreResult<Option<i64>> {
        self.property(key)
            .map(|value| {
                value.parse::<i64>().map_err(|_| CoreError::InvalidMetadata {
                    label: self.label.clone(),
                    message: format!("{key}={value} is not an integer"),
                })
            })
            .transpose()
    }

    /// Returns true if `key` is set.
    #[must_use]
    pub fn has_property(&self, key: &str) -> bool {
        self.props.lock().map.contains_key(key)
    }

    /// Sets `key` to `value`.
    pub fn set_property(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let mut props = self.props.lock();
        if props.map.get(key) != Some(&value) {
            props.map.insert(key.to_string(), value);
            props.changed = true;
        }
    }

    /// Sets `key` to an integer value.
    pub fn set_property_int(&self, key: &str, value: i64) {
        self.set_property(key, value.to_string());
    }

    /// Removes `key`.
    pub fn clear_property(&self, key: &str) {
        let mut props = self.props.lock();
        if props.map.remove(key).is_some() {
            props.changed = true;
        }
    }

    /// Returns the keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.props.lock().map.keys().cloned().collect()
    }

    /// Returns the value of `key`, setting it to `default` first if unset.
    pub fn ensure_property_set(&self, key: &str, default: &str) -> String {
        let mut props = self.props.lock();
        if let Some(value) = props.map.get(key) {
            return value.clone();
        }
        props.map.insert(key.to_string(), default.to_string());
        props.changed = true;
        default.to_string()
    }

    /// Checks that `key` has the value `expected`, setting it if unset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MetadataMismatch`] if `key` has another value.
    pub fn check_or_set(&self, key: &str, expected: &str) -> CoreResult<()> {
        let found = self.ensure_property_set(key, expected);
        if found != expected {
            return Err(CoreError::MetadataMismatch {
                label: self.label.clone(),
                key: key.to_string(),
                expected: expected.to_string(),
                found,
            });
        }
        Ok(())
    }

    /// Returns true if there are unflushed changes.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.props.lock().changed
    }

    /// Writes the properties to disk if they changed.
    ///
    /// The file is replaced atomically: written to a temporary file,
    /// synced, then renamed over the original.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn flush(&self) -> CoreResult<()> {
        let mut props = self.props.lock();
        if !props.changed {
            return Ok(());
        }
        if let Some(path) = &self.path {
            let temp = temp_path(path);
            let text = render(&self.label, &props.map);
            write_synced(&temp, text.as_bytes()).map_err(|e| CoreError::io(&temp, e))?;
            fs::rename(&temp, path).map_err(|e| CoreError::io(path, e))?;
            debug!(label = %self.label, properties = props.map.len(), "flushed metadata");
        }
        props.changed = false;
        Ok(())
    }

    /// Flushes pending changes.
    ///
    /// # Errors
    ///
    /// Same as [`MetaFile::flush`].
    pub fn close(&self) -> CoreResult<()> {
        self.flush()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(EXT_TEMP);
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn parse(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| match line.find(|c: char| c == '=' || c == ':') {
            Some(at) => (line[..at].trim().to_string(), line[at + 1..].trim().to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

fn render(label: &str, map: &BTreeMap<String, String>) -> String {
    let mut text = format!("# {label}\n");
    for (key, value) in map {
        text.push_str(key);
        text.push('=');
        text.push_str(value);
        text.push('\n');
    }
    text
}
