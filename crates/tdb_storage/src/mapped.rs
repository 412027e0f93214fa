//! Block access through memory-mapped segments.

use crate::access::BlockAccess;
use crate::base::{BlockState, MAX_BLOCK_ID};
use crate::block::{Block, BlockId};
use crate::error::{StorageError, StorageResult};
use crate::file_base::FileBase;
use crate::SEGMENT_SIZE;
use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

const INITIAL_SEGMENTS: usize = 1;
const GROWTH_FACTOR: usize = 2;

/// A block store over a file mapped in fixed-size segments.
///
/// Block `id` lives in segment `id / blocks_per_segment`. Segments are mapped
/// on first touch and the segment table doubles when an id falls past its
/// capacity. Writes mark their segment dirty; `sync` and `close` flush only
/// the dirty segments. `close` then unmaps every segment and drops this
/// store's handle on the file.
///
/// Looking up or mapping a segment, copying a block in or out of it and the
/// dirty bookkeeping all happen under one mutex, so two threads never map
/// the same segment twice.
#[derive(Debug)]
pub struct MappedBlockAccess {
    path: PathBuf,
    state: BlockState,
    segment_size: usize,
    blocks_per_segment: u64,
    table: Mutex<SegmentTable>,
}

#[derive(Debug)]
struct SegmentTable {
    /// `None` once the store is closed.
    file: Option<Arc<FileBase>>,
    segments: Vec<Option<MmapMut>>,
    dirty: Vec<bool>,
    dirty_count: usize,
    flush_counts: Vec<u64>,
    /// File length changed since the last sync.
    grown: bool,
}

impl SegmentTable {
    fn new(file: Arc<FileBase>) -> Self {
        Self {
            file: Some(file),
            segments: (0..INITIAL_SEGMENTS).map(|_| None).collect(),
            dirty: vec![false; INITIAL_SEGMENTS],
            dirty_count: 0,
            flush_counts: vec![0; INITIAL_SEGMENTS],
            grown: false,
        }
    }

    fn ensure_capacity(&mut self, seg: usize, label: &str) {
        if seg < self.segments.len() {
            return;
        }
        let mut capacity = self.segments.len().max(1);
        while capacity <= seg {
            capacity *= GROWTH_FACTOR;
        }
        debug!(file = %label, from = self.segments.len(), to = capacity, "growing segment table");
        self.segments.resize_with(capacity, || None);
        self.dirty.resize(capacity, false);
        self.flush_counts.resize(capacity, 0);
    }

    fn mark_dirty(&mut self, seg: usize) {
        if !self.dirty[seg] {
            self.dirty[seg] = true;
            self.dirty_count += 1;
        }
    }
}

impl MappedBlockAccess {
    /// Opens or creates a block file mapped in [`SEGMENT_SIZE`] segments.
    ///
    /// # Errors
    ///
    /// Returns a geometry error if the file length or the segment size is
    /// not a multiple of `block_size`, or an I/O error.
    pub fn open(path: &Path, block_size: usize) -> StorageResult<Self> {
        Self::with_segment_size(Arc::new(FileBase::open(path)?), block_size, SEGMENT_SIZE)
    }

    /// Builds a mapped block store over an already open file.
    ///
    /// # Errors
    ///
    /// Same as [`MappedBlockAccess::open`].
    pub fn from_file(file: Arc<FileBase>, block_size: usize) -> StorageResult<Self> {
        Self::with_segment_size(file, block_size, SEGMENT_SIZE)
    }

    /// Builds a mapped block store with a non-default segment size.
    ///
    /// `segment_size` must be a positive multiple of `block_size` and should
    /// be a multiple of the platform page size.
    ///
    /// # Errors
    ///
    /// Same as [`MappedBlockAccess::open`].
    pub fn with_segment_size(
        file: Arc<FileBase>,
        block_size: usize,
        segment_size: usize,
    ) -> StorageResult<Self> {
        let len = file.size()?;
        let blocks = BlockState::blocks_in_file(file.label(), len, block_size)?;
        if segment_size == 0 || segment_size % block_size != 0 {
            return Err(StorageError::geometry(
                file.label(),
                format!(
                    "segment size {segment_size} is not a positive multiple of the block size {block_size}"
                ),
            ));
        }
        let state = BlockState::new(file.label().to_string(), block_size, blocks, MAX_BLOCK_ID)?;
        debug!(file = %file.label(), block_size, segment_size, blocks, "opened mapped block file");

        Ok(Self {
            path: file.path().to_path_buf(),
            state,
            segment_size,
            blocks_per_segment: (segment_size / block_size) as u64,
            table: Mutex::new(SegmentTable::new(file)),
        })
    }

    /// Returns the path of the block file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the size in bytes of one mapped segment.
    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Returns how many blocks one segment holds.
    #[must_use]
    pub fn blocks_per_segment(&self) -> u64 {
        self.blocks_per_segment
    }

    /// Returns the number of segments currently mapped.
    #[must_use]
    pub fn mapped_segments(&self) -> usize {
        self.table.lock().segments.iter().filter(|s| s.is_some()).count()
    }

    /// Returns the ids of the segments written since the last flush.
    #[must_use]
    pub fn dirty_segments(&self) -> Vec<usize> {
        let table = self.table.lock();
        table
            .dirty
            .iter()
            .enumerate()
            .filter_map(|(seg, &dirty)| dirty.then_some(seg))
            .collect()
    }

    /// Returns how many times segment `seg` has been forced to disk.
    #[must_use]
    pub fn segment_flush_count(&self, seg: usize) -> u64 {
        self.table.lock().flush_counts.get(seg).copied().unwrap_or(0)
    }

    fn locate(&self, id: BlockId) -> (usize, usize) {
        let seg = (id / self.blocks_per_segment) as usize;
        let offset = ((id % self.blocks_per_segment) as usize) * self.state.block_size();
        (seg, offset)
    }

    /// Returns the mapping of segment `seg`, mapping it if needed.
    fn segment<'a>(&self, table: &'a mut SegmentTable, seg: usize) -> StorageResult<&'a mut MmapMut> {
        let label = self.state.label();
        table.ensure_capacity(seg, label);
        if table.segments[seg].is_none() {
            let file = table.file.clone().ok_or_else(|| StorageError::Closed {
                label: label.to_string(),
            })?;
            let start = seg as u64 * self.segment_size as u64;
            let end = start + self.segment_size as u64;
            if file.size()? < end {
                file.set_len(end)?;
                table.grown = true;
            }
            let mmap = map_segment(&file, start, self.segment_size)?;
            debug!(file = %label, segment = seg, "mapped segment");
            table.segments[seg] = Some(mmap);
        }
        table.segments[seg]
            .as_mut()
            .ok_or_else(|| StorageError::geometry(label, format!("segment {seg} is not mapped")))
    }

    fn store(&self, block: &Block) -> StorageResult<()> {
        let (seg, offset) = self.locate(block.id());
        let block_size = self.state.block_size();
        let mut table = self.table.lock();
        let mmap = self.segment(&mut table, seg)?;
        mmap[offset..offset + block_size].copy_from_slice(block.bytes());
        table.mark_dirty(seg);
        self.state.note_written(block.id());
        Ok(())
    }

    fn flush_dirty(&self) -> StorageResult<()> {
        let mut table = self.table.lock();
        self.flush_table(&mut table)
    }

    fn flush_table(&self, table: &mut SegmentTable) -> StorageResult<()> {
        if table.dirty_count > 0 {
            trace!(file = %self.state.label(), dirty = table.dirty_count, "flushing dirty segments");
        }
        for seg in 0..table.segments.len() {
            if !table.dirty[seg] {
                continue;
            }
            if let Some(mmap) = &table.segments[seg] {
                mmap.flush().map_err(|e| StorageError::io(self.state.label(), e))?;
            }
            table.dirty[seg] = false;
            table.dirty_count -= 1;
            table.flush_counts[seg] += 1;
        }
        if table.grown {
            if let Some(file) = &table.file {
                file.sync()?;
            }
            table.grown = false;
        }
        Ok(())
    }
}

#[allow(unsafe_code)]
fn map_segment(file: &FileBase, offset: u64, len: usize) -> StorageResult<MmapMut> {
    // SAFETY: the store holds the file until every segment is unmapped and
    // the mapped range lies within the file, which is never truncated while
    // mapped.
    unsafe { MmapOptions::new().offset(offset).len(len).map_mut(file.file()) }
        .map_err(|e| StorageError::io(file.label(), e))
}

impl BlockAccess for MappedBlockAccess {
    fn allocate(&self, size: usize) -> StorageResult<Block> {
        self.state.check_allocation_size(size)?;
        let id = self.state.allocate_id()?;
        let (seg, offset) = self.locate(id);
        let block_size = self.state.block_size();
        let mut table = self.table.lock();
        let mmap = self.segment(&mut table, seg)?;
        Ok(Block::new(id, mmap[offset..offset + block_size].to_vec()))
    }

    fn read(&self, id: BlockId) -> StorageResult<Block> {
        self.state.check_id(id)?;
        let (seg, offset) = self.locate(id);
        let block_size = self.state.block_size();
        let mut table = self.table.lock();
        let mmap = self.segment(&mut table, seg)?;
        Ok(Block::new(id, mmap[offset..offset + block_size].to_vec()))
    }

    fn write(&self, block: &Block) -> StorageResult<()> {
        self.state.check_write(block)?;
        self.store(block)
    }

    fn overwrite(&self, block: &Block) -> StorageResult<()> {
        self.state.check_overwrite(block)?;
        self.store(block)
    }

    fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    fn valid(&self, id: BlockId) -> bool {
        self.state.valid(id)
    }

    fn sync(&self) -> StorageResult<()> {
        self.state.check_open()?;
        self.flush_dirty()
    }

    fn close(&self) -> StorageResult<()> {
        self.state.mark_closed()?;
        let mut table = self.table.lock();
        let flushed = self.flush_table(&mut table);
        let mapped = table.segments.iter().filter(|s| s.is_some()).count();
        table.segments.iter_mut().for_each(|s| *s = None);
        table.file = None;
        debug!(file = %self.state.label(), unmapped = mapped, "closed mapped block file");
        flushed
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
