//! Memory-backed buffer channel.

use super::BufferChannel;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Fixed extra capacity added whenever the buffer grows.
const GROWTH_INCREMENT: usize = 1024;

/// Growable buffer whose logical length is kept apart from its capacity.
///
/// Bytes between `len` and `bytes.len()` are always zero.
#[derive(Debug, Default)]
struct Extent {
    bytes: Vec<u8>,
    len: usize,
    closed: bool,
}

impl Extent {
    /// Grows the buffer to hold `needed` bytes; `None` if that size is not
    /// addressable.
    fn ensure_capacity(&mut self, needed: usize) -> Option<()> {
        let capacity = self.bytes.len();
        if needed <= capacity {
            return Some(());
        }
        let new_capacity = capacity
            .saturating_mul(2)
            .max(needed.checked_add(GROWTH_INCREMENT)?);
        self.bytes.resize(new_capacity, 0);
        Some(())
    }
}

/// A buffer channel over a single in-memory byte buffer.
///
/// Duplicates share the buffer. Growth is geometric, so appending is
/// amortized O(1) per byte.
#[derive(Debug)]
pub struct MemBufferChannel {
    label: String,
    extent: Arc<RwLock<Extent>>,
    position: u64,
}

impl MemBufferChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_capacity(label, 0)
    }

    /// Creates an empty channel with preallocated capacity.
    #[must_use]
    pub fn with_capacity(label: impl Into<String>, capacity: usize) -> Self {
        Self {
            label: label.into(),
            extent: Arc::new(RwLock::new(Extent {
                bytes: vec![0; capacity],
                len: 0,
                closed: false,
            })),
            position: 0,
        }
    }

    /// Returns the allocated capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.extent.read().bytes.len()
    }

    fn closed_err(&self) -> StorageError {
        StorageError::Closed {
            label: self.label.clone(),
        }
    }

    fn read_from(&self, buf: &mut [u8], loc: u64) -> StorageResult<Option<usize>> {
        let extent = self.extent.read();
        if extent.closed {
            return Err(self.closed_err());
        }
        if buf.is_empty() {
            return Ok(Some(0));
        }
        let Ok(start) = usize::try_from(loc) else {
            return Ok(None);
        };
        if start >= extent.len {
            return Ok(None);
        }
        let n = buf.len().min(extent.len - start);
        buf[..n].copy_from_slice(&extent.bytes[start..start + n]);
        Ok(Some(n))
    }

    fn write_to(&self, buf: &[u8], loc: u64) -> StorageResult<usize> {
        let mut extent = self.extent.write();
        if extent.closed {
            return Err(self.closed_err());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let start = usize::try_from(loc).map_err(|_| {
            StorageError::geometry(&self.label, format!("position {loc} exceeds addressable memory"))
        })?;
        let end = start
            .checked_add(buf.len())
            .and_then(|end| extent.ensure_capacity(end).map(|()| end))
            .ok_or_else(|| {
                StorageError::geometry(
                    &self.label,
                    format!("write of {} bytes at {loc} exceeds addressable memory", buf.len()),
                )
            })?;
        extent.bytes[start..end].copy_from_slice(buf);
        extent.len = extent.len.max(end);
        Ok(buf.len())
    }
}

impl BufferChannel for MemBufferChannel {
    fn duplicate(&self) -> Box<dyn BufferChannel> {
        Box::new(Self {
            label: self.label.clone(),
            extent: Arc::clone(&self.extent),
            position: self.position,
        })
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn set_position(&mut self, pos: u64) -> StorageResult<()> {
        if self.extent.read().closed {
            return Err(self.closed_err());
        }
        self.position = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> StorageResult<Option<usize>> {
        let n = self.read_from(buf, self.position)?;
        if let Some(n) = n {
            self.position += n as u64;
        }
        Ok(n)
    }

    fn read_at(&self, buf: &mut [u8], loc: u64) -> StorageResult<Option<usize>> {
        self.read_from(buf, loc)
    }

    fn write(&mut self, buf: &[u8]) -> StorageResult<usize> {
        let n = self.write_to(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], loc: u64) -> StorageResult<usize> {
        self.write_to(buf, loc)
    }

    fn truncate(&mut self, size: u64) -> StorageResult<()> {
        let mut extent = self.extent.write();
        if extent.closed {
            return Err(self.closed_err());
        }
        if size < extent.len as u64 {
            let new_len = size as usize;
            let old_len = extent.len;
            extent.bytes[new_len..old_len].fill(0);
            extent.len = new_len;
        }
        self.position = self.position.min(size);
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        let extent = self.extent.read();
        if extent.closed {
            return Err(self.closed_err());
        }
        Ok(extent.len as u64)
    }

    fn sync(&self) -> StorageResult<()> {
        if self.extent.read().closed {
            return Err(self.closed_err());
        }
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        let mut extent = self.extent.write();
        if extent.closed {
            return Err(self.closed_err());
        }
        extent.closed = true;
        extent.bytes = Vec::new();
        extent.len = 0;
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn filename(&self) -> Option<&Path> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn memory_channel_growth_covers_shortfall() {
        let mut chan = MemBufferChannel::new("mem");
        chan.write(&[1u8; 10]).unwrap();
        assert_eq!(chan.capacity(), 10 + GROWTH_INCREMENT);

        let big = vec![2u8; 5000];
        chan.write(&big).unwrap();
        assert!(chan.capacity() >= 5010);
        assert_eq!(chan.size().unwrap(), 5010);
    }

    #[test]
    fn memory_channel_write_near_end_of_address_space_fails() {
        let mut chan = MemBufferChannel::new("mem");
        chan.write(b"xy").unwrap();

        chan.set_position(u64::MAX - 1).unwrap();
        let err = chan.write(b"abcd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometry);
        assert_eq!(chan.position(), u64::MAX - 1);

        // fits in usize, but not with the growth increment on top
        let near_end = usize::MAX as u64 - 600;
        let err = chan.write_at(b"abcd", near_end).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometry);

        assert_eq!(chan.size().unwrap(), 2);
    }

    #[test]
    fn memory_channel_truncate_hides_stale_bytes() {
        let mut chan = MemBufferChannel::new("mem");
        chan.write(&[7u8; 100]).unwrap();
        chan.truncate(10).unwrap();
        assert_eq!(chan.position(), 10);

        chan.write_at(b"x", 50).unwrap();
        let mut buf = [0xFFu8; 41];
        assert_eq!(chan.read_at(&mut buf, 10).unwrap(), Some(41));
        assert!(buf[..40].iter().all(|&b| b == 0));
        assert_eq!(buf[40], b'x');
    }

    #[test]
    fn memory_channel_read_at_end_is_none() {
        let mut chan = MemBufferChannel::new("mem");
        chan.write(b"abc").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(chan.read(&mut buf).unwrap(), None);
        assert_eq!(chan.read_at(&mut buf, 1).unwrap(), Some(2));
        assert_eq!(&buf[..2], b"bc");
    }

    #[test]
    fn memory_channel_duplicates_share_bytes() {
        let mut chan = MemBufferChannel::new("mem");
        let mut dup = chan.duplicate();
        dup.write(b"shared").unwrap();

        assert_eq!(chan.size().unwrap(), 6);
        assert_eq!(chan.position(), 0);
        let mut buf = [0u8; 6];
        chan.read(&mut buf).unwrap();
        assert_eq!(&buf, b"shared");
    }

    #[test]
    fn memory_channel_transfer_to_appends_at_cursor() {
        let mut src = MemBufferChannel::new("src");
        src.write(b"0123456789").unwrap();
        let mut dst = MemBufferChannel::new("dst");
        dst.write(b">>").unwrap();

        let copied = src.transfer_to(3, 4, &mut dst).unwrap();
        assert_eq!(copied, 4);
        let mut buf = [0u8; 6];
        dst.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b">>3456");

        // stops at the end of the source
        assert_eq!(src.transfer_to(8, 100, &mut dst).unwrap(), 2);
    }
}
