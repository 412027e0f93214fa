//! Cursor-based byte channels over a variable-length extent.
//!
//! Unlike [`crate::BlockAccess`], a channel holds records of any size and
//! has a cursor. It suits contiguous logical files such as object files and
//! journals.

mod file;
mod memory;

pub use file::FileBufferChannel;
pub use memory::MemBufferChannel;

use crate::error::StorageResult;
use std::path::Path;

const TRANSFER_CHUNK: usize = 64 * 1024;

/// A byte-addressable extent with an independent cursor.
///
/// Positioned operations (`read_at`, `write_at`) do not touch the cursor.
/// [`BufferChannel::duplicate`] returns a channel over the same storage
/// with its own cursor; channels do not serialize access between
/// duplicates, callers coordinate.
pub trait BufferChannel: Send + Sync {
    /// Returns a new channel over the same storage, with its cursor at the
    /// current position.
    fn duplicate(&self) -> Box<dyn BufferChannel>;

    /// Returns the cursor position.
    fn position(&self) -> u64;

    /// Moves the cursor. Positions past the end are allowed; a later write
    /// there zero-fills the gap.
    ///
    /// # Errors
    ///
    /// Returns a `Closed` error if the channel is closed.
    fn set_position(&mut self, pos: u64) -> StorageResult<()>;

    /// Reads at the cursor and advances it.
    ///
    /// Returns `None` at the end of the extent.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn read(&mut self, buf: &mut [u8]) -> StorageResult<Option<usize>>;

    /// Reads at `loc` without moving the cursor.
    ///
    /// Returns `None` if `loc` is at or past the end of the extent.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn read_at(&self, buf: &mut [u8], loc: u64) -> StorageResult<Option<usize>>;

    /// Writes at the cursor, growing the extent if needed, and advances the
    /// cursor. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn write(&mut self, buf: &[u8]) -> StorageResult<usize>;

    /// Writes at `loc` without moving the cursor.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn write_at(&self, buf: &[u8], loc: u64) -> StorageResult<usize>;

    /// Shrinks the extent to `size` bytes and clamps the cursor. Sizes at or
    /// above the current size leave the extent unchanged.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn truncate(&mut self, size: u64) -> StorageResult<()>;

    /// Returns the length of the extent.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn size(&self) -> StorageResult<u64>;

    /// Returns true if the extent is empty.
    ///
    /// # Errors
    ///
    /// Same as [`BufferChannel::size`].
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Forces written data to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn sync(&self) -> StorageResult<()>;

    /// Syncs and closes the channel and all its duplicates.
    ///
    /// # Errors
    ///
    /// Returns an I/O or `Closed` error.
    fn close(&mut self) -> StorageResult<()>;

    /// Returns the label used in messages.
    fn label(&self) -> &str;

    /// Returns the backing file name, if any.
    fn filename(&self) -> Option<&Path>;

    /// Copies `len` bytes starting at `loc` into `dst` at its cursor.
    ///
    /// Stops early at the end of this channel's extent. Returns the number
    /// of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns an error from either channel.
    fn transfer_to(&self, loc: u64, len: u64, dst: &mut dyn BufferChannel) -> StorageResult<u64> {
        let mut chunk = vec![0u8; TRANSFER_CHUNK.min(len as usize)];
        let mut copied = 0u64;
        while copied < len {
            let want = chunk.len().min((len - copied) as usize);
            let Some(n) = self.read_at(&mut chunk[..want], loc + copied)? else {
                break;
            };
            if n == 0 {
                break;
            }
            dst.write(&chunk[..n])?;
            copied += n as u64;
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone)]
    enum Op {
        WriteAt(u64, Vec<u8>),
        Truncate(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0..2048u64, prop::collection::vec(any::<u8>(), 0..256))
                .prop_map(|(loc, bytes)| Op::WriteAt(loc, bytes)),
            1 => (0..2048u64).prop_map(Op::Truncate),
        ]
    }

    fn apply(chan: &mut dyn BufferChannel, op: &Op) {
        match op {
            Op::WriteAt(loc, bytes) => {
                assert_eq!(chan.write_at(bytes, *loc).unwrap(), bytes.len());
            }
            Op::Truncate(size) => chan.truncate(*size).unwrap(),
        }
    }

    fn apply_to_model(model: &mut Vec<u8>, op: &Op) {
        match op {
            Op::WriteAt(_, bytes) if bytes.is_empty() => {}
            Op::WriteAt(loc, bytes) => {
                let start = *loc as usize;
                let end = start + bytes.len();
                if model.len() < end {
                    model.resize(end, 0);
                }
                model[start..end].copy_from_slice(bytes);
            }
            Op::Truncate(size) => model.truncate(*size as usize),
        }
    }

    fn contents(chan: &dyn BufferChannel) -> Vec<u8> {
        let mut buf = vec![0u8; chan.size().unwrap() as usize];
        if !buf.is_empty() {
            assert_eq!(chan.read_at(&mut buf, 0).unwrap(), Some(buf.len()));
        }
        buf
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn channels_behave_like_a_byte_vector(ops in prop::collection::vec(op_strategy(), 0..24)) {
            let temp = tempdir().unwrap();
            let mut file = FileBufferChannel::open(&temp.path().join("chan.dat")).unwrap();
            let mut mem = MemBufferChannel::with_capacity("mem", 16);
            let mut model = Vec::new();

            for op in &ops {
                apply(&mut file, op);
                apply(&mut mem, op);
                apply_to_model(&mut model, op);
                prop_assert_eq!(file.size().unwrap(), model.len() as u64);
                prop_assert_eq!(mem.size().unwrap(), model.len() as u64);
            }
            prop_assert_eq!(contents(&file), model.clone());
            prop_assert_eq!(contents(&mem), model);
        }
    }
}
