//! In-memory block access for testing.

use crate::access::BlockAccess;
use crate::base::{BlockState, MAX_BLOCK_ID};
use crate::block::{Block, BlockId};
use crate::error::StorageResult;
use parking_lot::RwLock;

/// How an in-memory store moves block contents in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// Deep-copy on every read and write, giving the isolation a real file
    /// provides.
    #[default]
    Copy,
    /// Store and hand out shared payloads without copying. Mutating a
    /// returned block still copies on write, so stored contents cannot be
    /// changed behind the store's back.
    Share,
}

/// A block store held entirely in memory.
///
/// Suitable for unit tests and ephemeral stores. Behaves like the file-backed
/// stores with respect to bounds, geometry and lifecycle checks.
///
/// # Example
///
/// ```rust
/// use tdb_storage::{BlockAccess, CopyMode, MemBlockAccess};
///
/// let store = MemBlockAccess::new("test", 64, CopyMode::Copy).unwrap();
/// let mut block = store.allocate(0).unwrap();
/// block.bytes_mut().unwrap()[0] = 42;
/// store.write(&block).unwrap();
/// assert_eq!(store.read(0).unwrap().bytes()[0], 42);
/// ```
#[derive(Debug)]
pub struct MemBlockAccess {
    state: BlockState,
    mode: CopyMode,
    blocks: RwLock<Vec<Block>>,
}

impl MemBlockAccess {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Returns a geometry error if `block_size` is zero.
    pub fn new(label: impl Into<String>, block_size: usize, mode: CopyMode) -> StorageResult<Self> {
        Ok(Self {
            state: BlockState::new(label.into(), block_size, 0, MAX_BLOCK_ID)?,
            mode,
            blocks: RwLock::new(Vec::new()),
        })
    }

    /// Returns the copy mode chosen at construction.
    #[must_use]
    pub fn copy_mode(&self) -> CopyMode {
        self.mode
    }

    fn copy_in(&self, block: &Block) -> Block {
        let mut stored = match self.mode {
            CopyMode::Copy => block.replicate(),
            CopyMode::Share => block.clone(),
        };
        stored.clear_modified();
        stored.set_read_only(false);
        stored
    }

    fn store(&self, block: &Block) {
        let id = block.id() as usize;
        let block_size = self.state.block_size();
        let stored = self.copy_in(block);
        let mut blocks = self.blocks.write();
        if id >= blocks.len() {
            let start = blocks.len() as BlockId;
            blocks.extend((start..id as BlockId).map(|gap| Block::zeroed(gap, block_size)));
            blocks.push(stored);
        } else {
            blocks[id] = stored;
        }
        self.state.note_written(block.id());
    }
}

impl BlockAccess for MemBlockAccess {
    fn allocate(&self, size: usize) -> StorageResult<Block> {
        self.state.check_allocation_size(size)?;
        let mut blocks = self.blocks.write();
        let id = self.state.allocate_id()?;
        let block_size = self.state.block_size();
        let start = blocks.len() as BlockId;
        blocks.extend((start..=id).map(|fresh| Block::zeroed(fresh, block_size)));
        Ok(Block::zeroed(id, block_size))
    }

    fn read(&self, id: BlockId) -> StorageResult<Block> {
        self.state.check_id(id)?;
        let blocks = self.blocks.read();
        let block = &blocks[id as usize];
        Ok(match self.mode {
            CopyMode::Copy => block.replicate(),
            CopyMode::Share => block.clone(),
        })
    }

    fn write(&self, block: &Block) -> StorageResult<()> {
        self.state.check_write(block)?;
        self.store(block);
        Ok(())
    }

    fn overwrite(&self, block: &Block) -> StorageResult<()> {
        self.state.check_overwrite(block)?;
        self.store(block);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    fn valid(&self, id: BlockId) -> bool {
        self.state.valid(id)
    }

    fn sync(&self) -> StorageResult<()> {
        self.state.check_open()
    }

    fn close(&self) -> StorageResult<()> {
        self.state.mark_closed()?;
        self.blocks.write().clear();
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn memory_default_mode_copies() {
        assert_eq!(CopyMode::default(), CopyMode::Copy);

        let store = MemBlockAccess::new("mem", 8, CopyMode::Copy).unwrap();
        let mut block = store.allocate(0).unwrap();
        block.bytes_mut().unwrap().fill(1);
        store.write(&block).unwrap();

        let read = store.read(0).unwrap();
        assert!(!read.shares_payload_with(&block));

        block.bytes_mut().unwrap().fill(2);
        assert_eq!(store.read(0).unwrap().bytes(), &[1; 8]);
    }

    #[test]
    fn memory_share_mode_does_not_copy() {
        let store = MemBlockAccess::new("mem", 8, CopyMode::Share).unwrap();
        let mut block = store.allocate(0).unwrap();
        block.bytes_mut().unwrap().fill(1);
        store.write(&block).unwrap();

        let read = store.read(0).unwrap();
        assert!(read.shares_payload_with(&block));

        // mutation after write detaches instead of corrupting the store
        block.bytes_mut().unwrap().fill(2);
        assert_eq!(store.read(0).unwrap().bytes(), &[1; 8]);
    }

    #[test]
    fn memory_allocate_wrong_size_fails() {
        let store = MemBlockAccess::new("mem", 8, CopyMode::Copy).unwrap();
        assert_eq!(store.allocate(16).unwrap_err().kind(), ErrorKind::Geometry);
        assert_eq!(store.allocate(8).unwrap().id(), 0);
    }

    #[test]
    fn memory_overwrite_fills_gaps_with_zeroes() {
        let store = MemBlockAccess::new("mem", 4, CopyMode::Copy).unwrap();
        store.overwrite(&Block::new(2, vec![9; 4])).unwrap();

        assert_eq!(store.num_blocks(), 3);
        assert_eq!(store.read(0).unwrap().bytes(), &[0; 4]);
        assert_eq!(store.read(2).unwrap().bytes(), &[9; 4]);
        assert_eq!(store.allocate(0).unwrap().id(), 3);
    }

    #[test]
    fn memory_close_rejects_reads() {
        let store = MemBlockAccess::new("mem", 4, CopyMode::Copy).unwrap();
        store.allocate(0).unwrap();
        store.close().unwrap();
        assert_eq!(store.read(0).unwrap_err().kind(), ErrorKind::Closed);
    }
}
