//! Block access by positioned file I/O.

use crate::access::BlockAccess;
use crate::base::BlockState;
use crate::block::{Block, BlockId};
use crate::error::{StorageError, StorageResult};
use crate::file_base::FileBase;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A block store that reads and writes each block with one positioned I/O
/// call of exactly `block_size` bytes at `id * block_size`.
///
/// There is no caching. Concurrent readers are safe because every transfer
/// is self-contained; allocation uses atomic counters. `close` syncs and
/// then drops this store's handle on the file.
///
/// # Example
///
/// ```no_run
/// use tdb_storage::{BlockAccess, DirectBlockAccess};
/// use std::path::Path;
///
/// let store = DirectBlockAccess::open(Path::new("nodes.idn"), 8192).unwrap();
/// let mut block = store.allocate(0).unwrap();
/// block.bytes_mut().unwrap().fill(0xAA);
/// store.write(&block).unwrap();
/// store.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct DirectBlockAccess {
    path: PathBuf,
    file: RwLock<Option<Arc<FileBase>>>,
    state: BlockState,
}

impl DirectBlockAccess {
    /// Opens or creates a block file.
    ///
    /// # Errors
    ///
    /// Returns a geometry error if the file length is not a multiple of
    /// `block_size`, or an I/O error if it cannot be opened.
    pub fn open(path: &Path, block_size: usize) -> StorageResult<Self> {
        Self::from_file(Arc::new(FileBase::open(path)?), block_size)
    }

    /// Builds a block store over an already open file.
    ///
    /// # Errors
    ///
    /// Same as [`DirectBlockAccess::open`].
    pub fn from_file(file: Arc<FileBase>, block_size: usize) -> StorageResult<Self> {
        let len = file.size()?;
        let blocks = BlockState::blocks_in_file(file.label(), len, block_size)?;
        let max_id = (u64::MAX / block_size as u64) - 1;
        let state = BlockState::new(file.label().to_string(), block_size, blocks, max_id)?;
        debug!(file = %file.label(), block_size, blocks, "opened direct block file");
        Ok(Self {
            path: file.path().to_path_buf(),
            file: RwLock::new(Some(file)),
            state,
        })
    }

    /// Returns the path of the block file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the open file, or a closed error once `close` released it.
    fn file(&self) -> StorageResult<Arc<FileBase>> {
        self.file.read().clone().ok_or_else(|| StorageError::Closed {
            label: self.state.label().to_string(),
        })
    }

    fn write_block(&self, block: &Block) -> StorageResult<()> {
        let offset = self.state.offset_of(block.id())?;
        self.file()?.write_all_at(block.bytes(), offset)?;
        self.state.note_written(block.id());
        Ok(())
    }
}

impl BlockAccess for DirectBlockAccess {
    fn allocate(&self, size: usize) -> StorageResult<Block> {
        self.state.check_allocation_size(size)?;
        let id = self.state.allocate_id()?;
        Ok(Block::zeroed(id, self.state.block_size()))
    }

    fn read(&self, id: BlockId) -> StorageResult<Block> {
        self.state.check_id(id)?;
        let offset = self.state.offset_of(id)?;
        let mut bytes = vec![0u8; self.state.block_size()];
        self.file()?.read_exact_at(&mut bytes, offset)?;
        Ok(Block::new(id, bytes))
    }

    fn write(&self, block: &Block) -> StorageResult<()> {
        self.state.check_write(block)?;
        self.write_block(block)
    }

    fn overwrite(&self, block: &Block) -> StorageResult<()> {
        self.state.check_overwrite(block)?;
        self.write_block(block)
    }

    fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    fn valid(&self, id: BlockId) -> bool {
        self.state.valid(id)
    }

    fn sync(&self) -> StorageResult<()> {
        self.state.check_open()?;
        self.file()?.sync()
    }

    fn close(&self) -> StorageResult<()> {
        self.state.mark_closed()?;
        debug!(file = %self.state.label(), blocks = self.state.num_blocks(), "closing direct block file");
        match self.file.write().take() {
            Some(file) => file.sync(),
            None => Ok(()),
        }
    }

    fn label(&self) -> &str {
        self.state.label()
    }

    fn block_size(&self) -> usize {
        self.state.block_size()
    }

    fn num_blocks(&self) -> u64 {
        self.state.num_blocks()
    }

    fn allocations(&self) -> u64 {
        self.state.allocations()
    }
}
