//! # TDB Storage
//!
//! Block access and buffer channels for the TDB triple store.
//!
//! This crate maps fixed-size blocks onto backing storage and provides
//! cursor-based byte channels for variable-length files. It does not
//! interpret block contents: B+Tree nodes, object files and journals are
//! built on top.
//!
//! ## Block access
//!
//! - [`DirectBlockAccess`] - one positioned read/write per block
//! - [`MappedBlockAccess`] - memory-mapped segments with dirty tracking
//! - [`MemBlockAccess`] - in-memory, for testing
//!
//! ## Buffer channels
//!
//! - [`FileBufferChannel`] - positioned file I/O
//! - [`MemBufferChannel`] - a growable in-memory buffer
//!
//! ## On-disk layout
//!
//! Block `id` occupies bytes `[id * block_size, (id + 1) * block_size)` of
//! its file. A block file's length is always a multiple of the block size.
//!
//! ## Example
//!
//! ```rust
//! use tdb_storage::{BlockAccess, CopyMode, MemBlockAccess};
//!
//! let store = MemBlockAccess::new("example", 128, CopyMode::Copy).unwrap();
//! let mut block = store.allocate(0).unwrap();
//! block.put_int(0, 7).unwrap();
//! store.write(&block).unwrap();
//! assert_eq!(store.read(block.id()).unwrap().get_int(0), Some(7));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod access;
mod base;
mod block;
mod channel;
mod direct;
mod error;
mod file_base;
mod mapped;
mod memory;

pub use access::BlockAccess;
pub use base::MAX_BLOCK_ID;
pub use block::{Block, BlockId, ByteOrder, NETWORK_ORDER};
pub use channel::{BufferChannel, FileBufferChannel, MemBufferChannel};
pub use direct::DirectBlockAccess;
pub use error::{ErrorKind, StorageError, StorageResult};
pub use file_base::FileBase;
pub use mapped::MappedBlockAccess;
pub use memory::{CopyMode, MemBlockAccess};

/// Default block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// Size in bytes of one mapped segment.
pub const SEGMENT_SIZE: usize = 8 * 1024 * 1024;
