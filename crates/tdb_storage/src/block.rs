//! Fixed-size, id-addressed unit of storage.

use crate::error::{StorageError, StorageResult};
use std::sync::Arc;

/// Identifier of a block within a single block file.
pub type BlockId = u64;

/// Byte order used to interpret multi-byte values inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Most significant byte first.
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

/// The only byte order a block store accepts.
pub const NETWORK_ORDER: ByteOrder = ByteOrder::BigEndian;

/// A block: an id plus a fixed-capacity byte region.
///
/// The payload is shared copy-on-write. Cloning a block is cheap and the
/// clones share bytes until one of them is mutated through
/// [`Block::bytes_mut`], at which point that clone gets its own copy. Use
/// [`Block::replicate`] for an eager deep copy.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    payload: Arc<Vec<u8>>,
    order: ByteOrder,
    read_only: bool,
    modified: bool,
}

impl Block {
    /// Creates a block in network byte order.
    #[must_use]
    pub fn new(id: BlockId, bytes: Vec<u8>) -> Self {
        Self::with_order(id, bytes, NETWORK_ORDER)
    }

    /// Creates a zero-filled block of the given size.
    #[must_use]
    pub fn zeroed(id: BlockId, size: usize) -> Self {
        Self::new(id, vec![0u8; size])
    }

    /// Creates a block with an explicit byte order.
    #[must_use]
    pub fn with_order(id: BlockId, bytes: Vec<u8>, order: ByteOrder) -> Self {
        Self {
            id,
            payload: Arc::new(bytes),
            order,
            read_only: false,
            modified: false,
        }
    }

    /// Returns the block id.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Relabels the block with a different id.
    pub fn set_id(&mut self, id: BlockId) {
        self.id = id;
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the payload.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload for mutation and marks the block modified.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] if the block is read-only.
    pub fn bytes_mut(&mut self) -> StorageResult<&mut [u8]> {
        if self.read_only {
            return Err(StorageError::ReadOnly { id: self.id });
        }
        self.modified = true;
        Ok(Arc::make_mut(&mut self.payload).as_mut_slice())
    }

    /// Returns the byte order of the block.
    #[must_use]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Returns an independent copy with its own payload.
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            id: self.id,
            payload: Arc::new(self.payload.as_ref().clone()),
            order: self.order,
            read_only: self.read_only,
            modified: self.modified,
        }
    }

    /// Returns true if both blocks currently share the same payload buffer.
    #[must_use]
    pub fn shares_payload_with(&self, other: &Block) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }

    /// Marks the block read-only (or writable again).
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Returns true if the block is read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns true if the payload has been mutated since creation or the
    /// last [`Block::clear_modified`].
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clears the modified flag.
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Reads a 32-bit integer at `offset` in the block's byte order.
    ///
    /// Returns `None` if the value does not fit in the payload.
    #[must_use]
    pub fn get_int(&self, offset: usize) -> Option<i32> {
        let raw: [u8; 4] = self.payload.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::BigEndian => i32::from_be_bytes(raw),
            ByteOrder::LittleEndian => i32::from_le_bytes(raw),
        })
    }

    /// Writes a 32-bit integer at `offset` in the block's byte order.
    ///
    /// # Errors
    ///
    /// Returns a geometry error if the value does not fit, or
    /// [`StorageError::ReadOnly`] for read-only blocks.
    pub fn put_int(&mut self, offset: usize, value: i32) -> StorageResult<()> {
        let raw = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.put_raw(offset, &raw)
    }

    /// Reads a 64-bit integer at `offset` in the block's byte order.
    #[must_use]
    pub fn get_long(&self, offset: usize) -> Option<i64> {
        let raw: [u8; 8] = self.payload.get(offset..offset + 8)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::BigEndian => i64::from_be_bytes(raw),
            ByteOrder::LittleEndian => i64::from_le_bytes(raw),
        })
    }

    /// Writes a 64-bit integer at `offset` in the block's byte order.
    ///
    /// # Errors
    ///
    /// Same as [`Block::put_int`].
    pub fn put_long(&mut self, offset: usize, value: i64) -> StorageResult<()> {
        let raw = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.put_raw(offset, &raw)
    }

    fn put_raw(&mut self, offset: usize, raw: &[u8]) -> StorageResult<()> {
        let id = self.id;
        let len = self.len();
        let bytes = self.bytes_mut()?;
        let slot = bytes.get_mut(offset..offset + raw.len()).ok_or_else(|| {
            StorageError::geometry(
                format!("block {id}"),
                format!("{} bytes at offset {offset} exceed block length {len}", raw.len()),
            )
        })?;
        slot.copy_from_slice(raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_until_mutated() {
        let mut a = Block::new(3, vec![1, 2, 3, 4]);
        let b = a.clone();
        assert!(a.shares_payload_with(&b));

        a.bytes_mut().unwrap()[0] = 9;
        assert!(!a.shares_payload_with(&b));
        assert_eq!(b.bytes(), &[1, 2, 3, 4]);
        assert_eq!(a.bytes(), &[9, 2, 3, 4]);
    }

    #[test]
    fn replicate_is_deep() {
        let a = Block::new(1, vec![5; 8]);
        let b = a.replicate();
        assert!(!a.shares_payload_with(&b));
        assert_eq!(a.bytes(), b.bytes());
        assert_eq!(b.id(), 1);
    }

    #[test]
    fn ints_are_big_endian_by_default() {
        let mut block = Block::zeroed(0, 16);
        block.put_int(0, 0x0102_0304).unwrap();
        assert_eq!(&block.bytes()[..4], &[1, 2, 3, 4]);
        assert_eq!(block.get_int(0), Some(0x0102_0304));

        block.put_long(8, -2).unwrap();
        assert_eq!(block.get_long(8), Some(-2));
        assert!(block.is_modified());
    }

    #[test]
    fn little_endian_block_reverses_bytes() {
        let mut block = Block::with_order(0, vec![0; 4], ByteOrder::LittleEndian);
        block.put_int(0, 0x0102_0304).unwrap();
        assert_eq!(block.bytes(), &[4, 3, 2, 1]);
    }

    #[test]
    fn put_past_end_fails() {
        let mut block = Block::zeroed(0, 6);
        assert!(block.put_int(4, 1).is_err());
        assert_eq!(block.get_long(0), None);
    }

    #[test]
    fn read_only_blocks_reject_mutation() {
        let mut block = Block::zeroed(2, 4);
        block.set_read_only(true);
        assert!(matches!(
            block.bytes_mut(),
            Err(StorageError::ReadOnly { id: 2 })
        ));
        assert!(!block.is_modified());
    }
}
