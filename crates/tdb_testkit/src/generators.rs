//! Property-based test generators using proptest.
//!
//! Operation sequences only read ids that were written first, because
//! allocated but unwritten blocks have unspecified contents.

use proptest::prelude::*;
use tdb_storage::{Block, BlockAccess, BlockId};

/// Strategy for block sizes that divide the test segment size.
pub fn block_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(64usize), Just(128), Just(512), Just(1024)]
}

/// Strategy for a full block payload of `block_size` bytes.
pub fn payload_strategy(block_size: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), block_size)
}

/// One step against a block store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOp {
    /// Allocate the next id.
    Allocate,
    /// Write a block filled with `fill` to an allocated id picked by `pick`.
    Write {
        /// Selects among the allocated ids.
        pick: usize,
        /// Fill byte.
        fill: u8,
    },
    /// Overwrite `id`, possibly past the end.
    Overwrite {
        /// Target id.
        id: BlockId,
        /// Fill byte.
        fill: u8,
    },
    /// Read a previously written id picked by `pick`.
    Read {
        /// Selects among the written ids.
        pick: usize,
    },
}

/// Strategy for a single operation; overwrite ids stay below `max_id`.
pub fn block_op_strategy(max_id: BlockId) -> impl Strategy<Value = BlockOp> {
    prop_oneof![
        3 => Just(BlockOp::Allocate),
        4 => (any::<usize>(), any::<u8>()).prop_map(|(pick, fill)| BlockOp::Write { pick, fill }),
        1 => (0..max_id, any::<u8>()).prop_map(|(id, fill)| BlockOp::Overwrite { id, fill }),
        3 => any::<usize>().prop_map(|pick| BlockOp::Read { pick }),
    ]
}

/// Strategy for a sequence of up to `max_len` operations.
pub fn op_sequence_strategy(max_len: usize, max_id: BlockId) -> impl Strategy<Value = Vec<BlockOp>> {
    prop::collection::vec(block_op_strategy(max_id), 0..max_len)
}

/// What a store observably did in response to an operation sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpTrace {
    /// Ids returned by `allocate`, in order.
    pub allocated: Vec<BlockId>,
    /// Contents returned by each `read`.
    pub reads: Vec<(BlockId, Vec<u8>)>,
    /// `num_blocks` after the last operation.
    pub num_blocks: u64,
    /// `is_empty` after the last operation.
    pub is_empty: bool,
}

/// Applies `ops` to `store` and records the observable results.
///
/// Writes and reads with nothing to pick from are skipped.
pub fn apply_ops(store: &dyn BlockAccess, ops: &[BlockOp]) -> OpTrace {
    let size = store.block_size();
    let mut trace = OpTrace::default();
    let mut allocated: Vec<BlockId> = Vec::new();
    let mut written: Vec<BlockId> = Vec::new();

    for op in ops {
        match op {
            BlockOp::Allocate => {
                let id = store.allocate(0).expect("allocate failed").id();
                allocated.push(id);
                trace.allocated.push(id);
            }
            BlockOp::Write { pick, fill } => {
                if allocated.is_empty() {
                    continue;
                }
                let id = allocated[pick % allocated.len()];
                store
                    .write(&Block::new(id, vec![*fill; size]))
                    .expect("write failed");
                written.push(id);
            }
            BlockOp::Overwrite { id, fill } => {
                store
                    .overwrite(&Block::new(*id, vec![*fill; size]))
                    .expect("overwrite failed");
                // an overwritten id is valid for plain writes from now on
                written.push(*id);
                allocated.push(*id);
            }
            BlockOp::Read { pick } => {
                if written.is_empty() {
                    continue;
                }
                let id = written[pick % written.len()];
                let block = store.read(id).expect("read failed");
                trace.reads.push((id, block.bytes().to_vec()));
            }
        }
    }
    trace.num_blocks = store.num_blocks();
    trace.is_empty = store.is_empty();
    trace
}
