//! File-backed buffer channel.

use super::BufferChannel;
use crate::error::{StorageError, StorageResult};
use crate::file_base::FileBase;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A buffer channel over a file, using positioned I/O for every transfer.
///
/// # Example
///
/// ```no_run
/// use tdb_storage::{BufferChannel, FileBufferChannel};
/// use std::path::Path;
///
/// let mut chan = FileBufferChannel::open(Path::new("nodes.dat")).unwrap();
/// chan.write(b"record").unwrap();
/// chan.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBufferChannel {
    file: Arc<FileBase>,
    position: u64,
    closed: Arc<AtomicBool>,
}

impl FileBufferChannel {
    /// Opens or creates the file at `path`, with the cursor at zero.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self::from_file(Arc::new(FileBase::open(path)?)))
    }

    /// Builds a channel over an already open file.
    #[must_use]
    pub fn from_file(file: Arc<FileBase>) -> Self {
        Self {
            file,
            position: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed {
                label: self.file.label().to_string(),
            });
        }
        Ok(())
    }

    fn read_from(&self, buf: &mut [u8], loc: u64) -> StorageResult<Option<usize>> {
        self.check_open()?;
        if buf.is_empty() {
            return Ok(Some(0));
        }
        let mut done = 0;
        while done < buf.len() {
            let n = self.file.read_at(&mut buf[done..], loc + done as u64)?;
            if n == 0 {
                break;
            }
            done += n;
        }
        Ok((done > 0).then_some(done))
    }
}

impl BufferChannel for FileBufferChannel {
    fn duplicate(&self) -> Box<dyn BufferChannel> {
        Box::new(Self {
            file: Arc::clone(&self.file),
            position: self.position,
            closed: Arc::clone(&self.closed),
        })
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn set_position(&mut self, pos: u64) -> StorageResult<()> {
        self.check_open()?;
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
        let n = self.write_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], loc: u64) -> StorageResult<usize> {
        self.check_open()?;
        self.file.write_all_at(buf, loc)?;
        Ok(buf.len())
    }

    fn truncate(&mut self, size: u64) -> StorageResult<()> {
        self.check_open()?;
        if size < self.file.size()? {
            self.file.set_len(size)?;
        }
        self.position = self.position.min(size);
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        self.check_open()?;
        self.file.size()
    }

    fn sync(&self) -> StorageResult<()> {
        self.check_open()?;
        self.file.sync()
    }

    fn close(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.file.sync()?;
        self.closed.store(true, Ordering::Release);
        debug!(file = %self.file.label(), "closed buffer channel");
        Ok(())
    }

    fn label(&self) -> &str {
        self.file.label()
    }

    fn filename(&self) -> Option<&Path> {
        Some(self.file.path())
    }
}
