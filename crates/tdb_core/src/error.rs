//! Error types for TDB core.

use std::io;
use std::path::PathBuf;
use tdb_storage::{ErrorKind, StorageError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in location, lock and file management.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Block or channel error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error on a location or metadata file.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The location is locked by another live process.
    #[error(
        "location {location} is locked by process {pid}; it cannot be opened \
         concurrently from another process"
    )]
    LocationLocked {
        /// Display form of the location.
        location: String,
        /// Process holding the lock.
        pid: u32,
    },

    /// The lock file exists but does not hold a process id.
    #[error("lock file {path} is corrupt (contents {contents:?}); remove it manually if no process is using the location")]
    LockFileCorrupt {
        /// Path of the lock file.
        path: PathBuf,
        /// What the file contained.
        contents: String,
    },

    /// Attempted to release a lock held by a different process.
    #[error("cannot release lock on {location}: it is owned by process {owner}, not {pid}")]
    LockNotOwned {
        /// Display form of the location.
        location: String,
        /// Process recorded in the lock file.
        owner: u32,
        /// This process.
        pid: u32,
    },

    /// The process id of this process could not be determined.
    #[error("cannot determine the current process id")]
    UnknownProcessId,

    /// A file that must only be opened once is already open.
    #[error("file already open: {path}")]
    ChannelInUse {
        /// Path of the file.
        path: PathBuf,
    },

    /// A metadata property does not have the expected value.
    #[error("metadata mismatch in {label}: {key} is {found:?}, expected {expected:?}")]
    MetadataMismatch {
        /// Metadata file label.
        label: String,
        /// Property key.
        key: String,
        /// Expected value.
        expected: String,
        /// Value found.
        found: String,
    },

    /// A metadata property could not be parsed.
    #[error("invalid metadata in {label}: {message}")]
    InvalidMetadata {
        /// Metadata file label.
        label: String,
        /// What is wrong.
        message: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },
}

/// Coarse classification of a core failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreErrorKind {
    /// Block id outside the valid range.
    Bounds,
    /// Geometry violation.
    Geometry,
    /// Platform I/O failure.
    Io,
    /// Use after close.
    Closed,
    /// Location locked by another live process.
    LockContention,
    /// Lock file unreadable or not a process id.
    LockCorrupt,
    /// The caller broke the usage contract.
    Usage,
}

impl CoreError {
    /// Wraps a platform error, naming the path involved.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            Self::Storage(e) => match e.kind() {
                ErrorKind::Bounds => CoreErrorKind::Bounds,
                ErrorKind::Geometry => CoreErrorKind::Geometry,
                ErrorKind::Io => CoreErrorKind::Io,
                ErrorKind::Closed => CoreErrorKind::Closed,
                ErrorKind::Usage => CoreErrorKind::Usage,
            },
            Self::Io { .. } | Self::UnknownProcessId => CoreErrorKind::Io,
            Self::LocationLocked { .. } => CoreErrorKind::LockContention,
            Self::LockFileCorrupt { .. } => CoreErrorKind::LockCorrupt,
            Self::MetadataMismatch { .. } | Self::InvalidMetadata { .. } => {
                CoreErrorKind::Geometry
            }
            Self::LockNotOwned { .. }
            | Self::ChannelInUse { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidOperation { .. } => CoreErrorKind::Usage,
        }
    }
}
