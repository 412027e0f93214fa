//! # TDB Core
//!
//! Locations, locking and file management for the TDB triple store.
//!
//! A [`Location`] is the directory (or memory namespace) holding a store's
//! files. Its [`LocationLock`] keeps a second process from opening the same
//! store. A [`FileSet`] names the files of one index and carries its
//! [`MetaFile`]; the [`FileFactory`] opens block stores and channels for
//! file sets according to a [`StoreConfig`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use tdb_core::{FileFactory, FileSet, StoreConfig};
//!
//! let factory = FileFactory::new(StoreConfig::default())?;
//! let location = factory.location("/var/lib/tdb/db")?;
//! location.lock().obtain()?;
//!
//! let spo = FileSet::new(location.clone(), "SPO");
//! let nodes = factory.block_access(&spo, "idn")?;
//! let block = nodes.allocate(0)?;
//! nodes.write(&block)?;
//!
//! factory.close()?;
//! location.lock().release()?;
//! # Ok::<(), tdb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod factory;
mod file_set;
mod location;
mod lock;
mod meta_file;
pub mod names;
mod process;
mod registry;

pub use config::{FileMode, StoreConfig, ENV_BLOCK_SIZE, ENV_FILE_MODE};
pub use error::{CoreError, CoreErrorKind, CoreResult};
pub use factory::FileFactory;
pub use file_set::FileSet;
pub use location::Location;
pub use lock::LocationLock;
pub use meta_file::MetaFile;
pub use process::{ProcessProbe, SystemProbe};
pub use registry::ChannelRegistry;

pub use tdb_storage::{
    Block, BlockAccess, BlockId, BufferChannel, ByteOrder, CopyMode, DEFAULT_BLOCK_SIZE,
    MAX_BLOCK_ID, NETWORK_ORDER, SEGMENT_SIZE,
};
