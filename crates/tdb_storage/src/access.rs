//! Block access trait definition.

use crate::block::{Block, BlockId};
use crate::error::StorageResult;

/// Allocate, read, write and overwrite fixed-size blocks by id.
///
/// A block access instance owns one backing file (or none, for the
/// in-memory variant) and one block size fixed at construction. It does not
/// interpret block contents.
///
/// # Invariants
///
/// - Every block read or written has exactly [`BlockAccess::block_size`]
///   bytes and network byte order; anything else is a geometry error.
/// - `id` is valid for `read`/`write` iff `id < num_blocks()`.
/// - `allocate` returns the next unused id and grows `num_blocks` by one.
/// - Any operation after `close` fails with a `Closed` error.
///
/// # Implementors
///
/// - [`super::DirectBlockAccess`] - positioned file I/O per block
/// - [`super::MappedBlockAccess`] - memory-mapped segments
/// - [`super::MemBlockAccess`] - in-memory, for testing
pub trait BlockAccess: Send + Sync {
    /// Allocates a fresh block.
    ///
    /// `size` must be zero (meaning "the fixed block size") or equal to the
    /// block size. The contents of the returned block are unspecified until
    /// written.
    ///
    /// # Errors
    ///
    /// Returns a geometry error for any other size, or a bounds error if no
    /// further id can be represented.
    fn allocate(&self, size: usize) -> StorageResult<Block>;

    /// Reads the current contents of block `id`.
    ///
    /// Safe to call from several threads at once.
    ///
    /// # Errors
    ///
    /// Returns a bounds error if `id` is not valid, or an I/O error.
    fn read(&self, id: BlockId) -> StorageResult<Block>;

    /// Writes a block to the storage of its id.
    ///
    /// # Errors
    ///
    /// Returns a bounds error if the id is not valid, a geometry error for
    /// the wrong size or byte order, or an I/O error.
    fn write(&self, block: &Block) -> StorageResult<()>;

    /// Like [`BlockAccess::write`] but the id may lie beyond the valid range,
    /// in which case the valid range is extended to `id + 1`.
    ///
    /// # Errors
    ///
    /// Same as [`BlockAccess::write`], except that ids past the end are
    /// accepted up to the largest representable id.
    fn overwrite(&self, block: &Block) -> StorageResult<()>;

    /// Returns true if nothing has been written to the store yet.
    fn is_empty(&self) -> bool;

    /// Returns true if `id` is currently a valid block id.
    fn valid(&self, id: BlockId) -> bool;

    /// Forces all written data to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the data cannot be made durable.
    fn sync(&self) -> StorageResult<()>;

    /// Syncs and releases the backing resources.
    ///
    /// # Errors
    ///
    /// Returns a `Closed` error if already closed, or an I/O error.
    fn close(&self) -> StorageResult<()>;

    /// Returns the label (file name or store name) used in messages.
    fn label(&self) -> &str;

    /// Returns the fixed block size in bytes.
    fn block_size(&self) -> usize;

    /// Returns the number of valid block ids.
    fn num_blocks(&self) -> u64;

    /// Returns how many times `allocate` has succeeded on this instance.
    fn allocations(&self) -> u64;
}
