//! Error types for block and channel operations.

use crate::block::{BlockId, ByteOrder};
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification of a storage failure.
///
/// Callers that need to present an actionable message match on the kind
/// rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Block id outside the valid range, or too large to represent.
    Bounds,
    /// Block size, byte order or file length does not fit the store geometry.
    Geometry,
    /// Failure reported by the platform, including short transfers.
    Io,
    /// The store or channel has already been closed.
    Closed,
    /// The caller broke the usage contract of the API.
    Usage,
}

/// Errors that can occur during storage operations.
///
/// None of these are retried or recovered locally.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred on the named file or store.
    #[error("I/O error on {label}: {source}")]
    Io {
        /// File name or store label.
        label: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Block id is not in `[0, limit)`.
    #[error("{label}: block id {id} out of bounds (limit {limit})")]
    OutOfBounds {
        /// File name or store label.
        label: String,
        /// Offending id.
        id: BlockId,
        /// Number of valid blocks (or the largest representable id + 1).
        limit: u64,
    },

    /// Block does not have the store's fixed size.
    #[error("{label}: wrong block size for block {id}: expected {expected}, got {actual}")]
    BlockSize {
        /// File name or store label.
        label: String,
        /// Offending id.
        id: BlockId,
        /// Block size of the store.
        expected: usize,
        /// Size of the supplied block.
        actual: usize,
    },

    /// Block is not in network byte order.
    #[error("{label}: block {id} has byte order {order:?}, store requires big-endian")]
    ByteOrder {
        /// File name or store label.
        label: String,
        /// Offending id.
        id: BlockId,
        /// Order of the supplied block.
        order: ByteOrder,
    },

    /// A block or segment geometry constraint was violated.
    #[error("{label}: {message}")]
    Geometry {
        /// File name or store label.
        label: String,
        /// What is wrong with the geometry.
        message: String,
    },

    /// Attempted to mutate a block marked read-only.
    #[error("block {id} is read-only")]
    ReadOnly {
        /// Offending id.
        id: BlockId,
    },

    /// The store or channel is closed.
    #[error("{label} is closed")]
    Closed {
        /// File name or store label.
        label: String,
    },
}

impl StorageError {
    /// Wraps a platform error, naming the file or store it came from.
    pub fn io(label: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            label: label.into(),
            source,
        }
    }

    /// Creates a geometry error.
    pub fn geometry(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Geometry {
            label: label.into(),
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::OutOfBounds { .. } => ErrorKind::Bounds,
            Self::BlockSize { .. } | Self::ByteOrder { .. } | Self::Geometry { .. } => {
                ErrorKind::Geometry
            }
            Self::ReadOnly { .. } => ErrorKind::Usage,
            Self::Closed { .. } => ErrorKind::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_classified() {
        let err = StorageError::io("f.dat", io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(err.kind(), ErrorKind::Io);

        let err = StorageError::OutOfBounds {
            label: "f.dat".into(),
            id: 7,
            limit: 3,
        };
        assert_eq!(err.kind(), ErrorKind::Bounds);

        let err = StorageError::geometry("f.dat", "bad");
        assert_eq!(err.kind(), ErrorKind::Geometry);
    }

    #[test]
    fn messages_name_the_file_and_id() {
        let err = StorageError::OutOfBounds {
            label: "nodes.idn".into(),
            id: 12,
            limit: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("nodes.idn"));
        assert!(msg.contains("12"));
    }
}
