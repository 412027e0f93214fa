//! Shared positioned-I/O file handle.

use crate::error::{StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// An open read-write file addressed by absolute offsets.
///
/// All transfers are positioned (`pread`/`pwrite` style) and never move a
/// shared cursor, so one `FileBase` can be used from several threads and by
/// several channels at once.
#[derive(Debug)]
pub struct FileBase {
    path: PathBuf,
    label: String,
    file: File,
}

impl FileBase {
    /// Opens or creates the file at `path` for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error naming the file if it cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let label = path.display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::io(&label, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            label,
            file,
        })
    }

    /// Opens the file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(parent.display().to_string(), e))?;
        }
        Self::open(path)
    }

    /// Returns the path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the display form of the path, used in error messages.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the underlying file.
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Returns the current file length in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn size(&self) -> StorageResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| self.err(e))
    }

    /// Sets the file length, zero-extending or truncating.
    ///
    /// # Errors
    ///
    /// Returns an error if the length cannot be changed.
    pub fn set_len(&self, len: u64) -> StorageResult<()> {
        self.file.set_len(len).map_err(|e| self.err(e))
    }

    /// Forces data and metadata to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> StorageResult<()> {
        self.file.sync_all().map_err(|e| self.err(e))
    }

    /// Reads at most `buf.len()` bytes at `offset`.
    ///
    /// Returns the number of bytes read; zero means end of file.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform read fails.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        loop {
            match pread(&self.file, buf, offset) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.err(e)),
            }
        }
    }

    /// Fills `buf` from `offset`.
    ///
    /// # Errors
    ///
    /// A short read (end of file before `buf` is full) is reported as an
    /// I/O error of kind `UnexpectedEof`, naming the offset and byte counts.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<()> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.read_at(&mut buf[done..], offset + done as u64)?;
            if n == 0 {
                return Err(self.err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "short read at offset {offset}: {done} of {} bytes",
                        buf.len()
                    ),
                )));
            }
            done += n;
        }
        Ok(())
    }

    /// Writes all of `buf` at `offset`, extending the file if needed.
    ///
    /// # Errors
    ///
    /// A write that transfers zero bytes is reported as a short write.
    pub fn write_all_at(&self, buf: &[u8], offset: u64) -> StorageResult<()> {
        let mut done = 0;
        while done < buf.len() {
            match pwrite(&self.file, &buf[done..], offset + done as u64) {
                Ok(0) => {
                    return Err(self.err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!(
                            "short write at offset {offset}: {done} of {} bytes",
                            buf.len()
                        ),
                    )));
                }
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.err(e)),
            }
        }
        Ok(())
    }

    fn err(&self, source: io::Error) -> StorageError {
        StorageError::io(&self.label, source)
    }
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(unix)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(windows)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn positioned_write_and_read() {
        let dir = tempdir().unwrap();
        let file = FileBase::open(&dir.path().join("f.dat")).unwrap();

        file.write_all_at(b"world", 6).unwrap();
        file.write_all_at(b"hello ", 0).unwrap();
        assert_eq!(file.size().unwrap(), 11);

        let mut buf = [0u8; 11];
        file.read_exact_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn short_read_is_an_io_error() {
        let dir = tempdir().unwrap();
        let file = FileBase::open(&dir.path().join("f.dat")).unwrap();
        file.write_all_at(b"abc", 0).unwrap();

        let mut buf = [0u8; 8];
        let err = file.read_exact_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn open_with_create_dirs_makes_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("f.dat");
        let file = FileBase::open_with_create_dirs(&path).unwrap();
        assert_eq!(file.size().unwrap(), 0);
        assert_eq!(file.path(), path);
    }
}
