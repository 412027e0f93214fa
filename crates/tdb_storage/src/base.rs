//! Bookkeeping shared by the block access implementations.

use crate::block::{Block, BlockId, NETWORK_ORDER};
use crate::error::{StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Largest block id the mapped and in-memory stores accept.
pub const MAX_BLOCK_ID: BlockId = i32::MAX as BlockId;

/// Block count, allocation sequence and lifecycle flags of one store.
///
/// Counters are atomics so that `allocate` and `overwrite` can grow the
/// valid range concurrently without a lock.
#[derive(Debug)]
pub(crate) struct BlockState {
    label: String,
    block_size: usize,
    max_id: BlockId,
    num_blocks: AtomicU64,
    allocations: AtomicU64,
    empty: AtomicBool,
    closed: AtomicBool,
}

impl BlockState {
    pub(crate) fn new(
        label: String,
        block_size: usize,
        num_blocks: u64,
        max_id: BlockId,
    ) -> StorageResult<Self> {
        if block_size == 0 {
            return Err(StorageError::geometry(label, "block size must be positive"));
        }
        Ok(Self {
            label,
            block_size,
            max_id,
            num_blocks: AtomicU64::new(num_blocks),
            allocations: AtomicU64::new(0),
            empty: AtomicBool::new(num_blocks == 0),
            closed: AtomicBool::new(false),
        })
    }

    /// Checks that the length of a file fits whole blocks and returns the
    /// number of blocks it holds.
    pub(crate) fn blocks_in_file(label: &str, len: u64, block_size: usize) -> StorageResult<u64> {
        if block_size == 0 {
            return Err(StorageError::geometry(label, "block size must be positive"));
        }
        let block_size = block_size as u64;
        if len % block_size != 0 {
            return Err(StorageError::geometry(
                label,
                format!("file length {len} is not a multiple of the block size {block_size}"),
            ));
        }
        Ok(len / block_size)
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    pub(crate) fn num_blocks(&self) -> u64 {
        self.num_blocks.load(Ordering::Acquire)
    }

    pub(crate) fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Acquire)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.empty.load(Ordering::Acquire)
    }

    pub(crate) fn valid(&self, id: BlockId) -> bool {
        id < self.num_blocks()
    }

    pub(crate) fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed {
                label: self.label.clone(),
            });
        }
        Ok(())
    }

    /// Marks the store closed; fails if it already was.
    pub(crate) fn mark_closed(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StorageError::Closed {
                label: self.label.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_allocation_size(&self, size: usize) -> StorageResult<()> {
        if size != 0 && size != self.block_size {
            return Err(StorageError::geometry(
                &self.label,
                format!(
                    "allocation of {size} bytes does not match the block size {}",
                    self.block_size
                ),
            ));
        }
        Ok(())
    }

    /// Reserves the next id.
    pub(crate) fn allocate_id(&self) -> StorageResult<BlockId> {
        self.check_open()?;
        let mut current = self.num_blocks();
        loop {
            if current > self.max_id {
                return Err(self.out_of_bounds(current, self.max_id.saturating_add(1)));
            }
            match self.num_blocks.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Ok(current)
    }

    /// Checks `id` for a read or write of an existing block.
    pub(crate) fn check_id(&self, id: BlockId) -> StorageResult<()> {
        self.check_open()?;
        let limit = self.num_blocks();
        if id >= limit {
            return Err(self.out_of_bounds(id, limit));
        }
        Ok(())
    }

    /// Checks size and byte order of a block about to be stored.
    pub(crate) fn check_block(&self, block: &Block) -> StorageResult<()> {
        if block.len() != self.block_size {
            return Err(StorageError::BlockSize {
                label: self.label.clone(),
                id: block.id(),
                expected: self.block_size,
                actual: block.len(),
            });
        }
        if block.order() != NETWORK_ORDER {
            return Err(StorageError::ByteOrder {
                label: self.label.clone(),
                id: block.id(),
                order: block.order(),
            });
        }
        Ok(())
    }

    /// Full validation for `write`.
    pub(crate) fn check_write(&self, block: &Block) -> StorageResult<()> {
        self.check_id(block.id())?;
        self.check_block(block)
    }

    /// Validation for `overwrite`; ids past the end are accepted.
    pub(crate) fn check_overwrite(&self, block: &Block) -> StorageResult<()> {
        self.check_open()?;
        if block.id() > self.max_id {
            return Err(self.out_of_bounds(block.id(), self.max_id.saturating_add(1)));
        }
        self.check_block(block)
    }

    /// Records a completed write or overwrite of `id`.
    pub(crate) fn note_written(&self, id: BlockId) {
        self.num_blocks.fetch_max(id + 1, Ordering::AcqRel);
        self.empty.store(false, Ordering::Release);
    }

    /// Byte offset of `id` within a block file.
    pub(crate) fn offset_of(&self, id: BlockId) -> StorageResult<u64> {
        id.checked_mul(self.block_size as u64)
            .ok_or_else(|| self.out_of_bounds(id, self.max_id.saturating_add(1)))
    }

    fn out_of_bounds(&self, id: BlockId, limit: u64) -> StorageError {
        StorageError::OutOfBounds {
            label: self.label.clone(),
            id,
            limit,
        }
    }
}
