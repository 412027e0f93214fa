//! Single-writer advisory lock on a location.
//!
//! The lock is the file `tdb.lock` in the location's directory, holding the
//! decimal id of the owning process. A lock whose owner is no longer alive
//! is stale and is reclaimed by the next `obtain`. Nothing stops a process
//! that ignores the lock from writing to the files.

use crate::error::{CoreError, CoreResult};
use crate::location::Location;
use crate::names::TDB_LOCK_FILE;
use crate::process::ProcessProbe;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The advisory lock of one location.
///
/// States: unlocked (no lock file, an empty one, or one naming a dead
/// process), locked by this process, or locked by another live process.
/// Memory locations cannot be locked; every operation on them is a no-op.
///
/// While the lock file is read or rewritten an OS file lock is held on it,
/// so two processes racing to obtain the same location are serialized.
#[derive(Debug, Clone)]
pub struct LocationLock {
    location: Location,
    probe: Arc<dyn ProcessProbe>,
}

impl LocationLock {
    /// Creates the lock for `location`.
    #[must_use]
    pub fn new(location: Location, probe: Arc<dyn ProcessProbe>) -> Self {
        Self { location, probe }
    }

    /// Returns the locked location.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Returns the lock file path, or `None` for memory locations.
    #[must_use]
    pub fn lock_path(&self) -> Option<PathBuf> {
        self.location.path(TDB_LOCK_FILE)
    }

    /// Returns true if this location supports locking at all.
    #[must_use]
    pub fn can_lock(&self) -> bool {
        !self.location.is_mem()
    }

    /// Returns the process recorded in the lock file, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockFileCorrupt`] if the file does not hold a
    /// process id, or an I/O error if it cannot be read.
    pub fn owner(&self) -> CoreResult<Option<u32>> {
        let Some(path) = self.lock_path() else {
            return Ok(None);
        };
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::io(&path, e)),
        };
        FileExt::lock_shared(&file).map_err(|e| CoreError::io(&path, e))?;
        read_owner(&mut file, &path)
    }

    /// Returns true if the lock file names a process, alive or not.
    ///
    /// # Errors
    ///
    /// Same as [`LocationLock::owner`].
    pub fn is_locked(&self) -> CoreResult<bool> {
        Ok(self.owner()?.is_some())
    }

    /// Returns true if this process holds the lock.
    ///
    /// # Errors
    ///
    /// Same as [`LocationLock::owner`].
    pub fn is_owned(&self) -> CoreResult<bool> {
        let owner = self.owner()?;
        Ok(owner.is_some() && owner == self.probe.current_pid())
    }

    /// Returns true if [`LocationLock::obtain`] would succeed now.
    ///
    /// # Errors
    ///
    /// Same as [`LocationLock::owner`].
    pub fn can_obtain(&self) -> CoreResult<bool> {
        if !self.can_lock() {
            return Ok(false);
        }
        let Some(pid) = self.probe.current_pid() else {
            return Ok(false);
        };
        Ok(match self.owner()? {
            None => true,
            Some(owner) if owner == pid => true,
            Some(owner) => !self.probe.is_alive(owner),
        })
    }

    /// Takes the lock for this process.
    ///
    /// A no-op if this process already holds it or the location is in
    /// memory. A lock held by a dead process is reclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LocationLocked`] naming the owner if another live
    /// process holds the lock, [`CoreError::LockFileCorrupt`] for a lock
    /// file that does not hold a process id, or an I/O error.
    pub fn obtain(&self) -> CoreResult<()> {
        let Some(path) = self.lock_path() else {
            return Ok(());
        };
        let pid = self.probe.current_pid().ok_or(CoreError::UnknownProcessId)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| CoreError::io(&path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| CoreError::io(&path, e))?;

        match read_owner(&mut file, &path)? {
            Some(owner) if owner == pid => Ok(()),
            Some(owner) if self.probe.is_alive(owner) => Err(CoreError::LocationLocked {
                location: self.location.to_string(),
                pid: owner,
            }),
            Some(owner) => {
                warn!(location = %self.location, stale = owner, pid, "reclaiming lock of dead process");
                write_owner(&mut file, &path, pid)
            }
            None => {
                write_owner(&mut file, &path, pid)?;
                info!(location = %self.location, pid, "obtained location lock");
                Ok(())
            }
        }
    }

    /// Releases the lock held by this process and removes the lock file.
    ///
    /// A no-op if there is no lock file or the location is in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockNotOwned`] if the lock names another
    /// process, dead or alive.
    pub fn release(&self) -> CoreResult<()> {
        let Some(path) = self.lock_path() else {
            return Ok(());
        };
        let pid = self.probe.current_pid().ok_or(CoreError::UnknownProcessId)?;
        let mut file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CoreError::io(&path, e)),
        };
        FileExt::lock_exclusive(&file).map_err(|e| CoreError::io(&path, e))?;

        match read_owner(&mut file, &path)? {
            Some(owner) if owner != pid => Err(CoreError::LockNotOwned {
                location: self.location.to_string(),
                owner,
                pid,
            }),
            _ => {
                drop(file);
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(CoreError::io(&path, e)),
                }
                debug!(location = %self.location, pid, "released location lock");
                Ok(())
            }
        }
    }
}

/// Reads the owner pid. An empty file (left by a crash between creating
/// and writing it) has no owner.
fn read_owner(file: &mut File, path: &Path) -> CoreResult<Option<u32>> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut contents))
        .map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => CoreError::LockFileCorrupt {
                path: path.to_path_buf(),
                contents: "<not text>".to_string(),
            },
            _ => CoreError::io(path, e),
        })?;

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| CoreError::LockFileCorrupt {
            path: path.to_path_buf(),
            contents: trimmed.to_string(),
        })
}

fn write_owner(file: &mut File, path: &Path, pid: u32) -> CoreResult<()> {
    file.set_len(0)
        .and_then(|()| file.seek(SeekFrom::Start(0)))
        .and_then(|_| file.write_all(format!("{pid}\n").as_bytes()))
        .and_then(|()| file.sync_all())
        .map_err(|e| CoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreErrorKind;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use tempfile::tempdir;

    /// Pretends to be process `pid` and reports the listed pids alive.
    #[derive(Debug)]
    struct ScriptedProbe {
        pid: u32,
        alive: Arc<Mutex<HashSet<u32>>>,
    }

    impl ProcessProbe for ScriptedProbe {
        fn current_pid(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.alive.lock().contains(&pid)
        }
    }

    fn probe(pid: u32, alive: &Arc<Mutex<HashSet<u32>>>) -> Arc<dyn ProcessProbe> {
        alive.lock().insert(pid);
        Arc::new(ScriptedProbe {
            pid,
            alive: Arc::clone(alive),
        })
    }

    #[test]
    fn obtain_writes_pid_and_release_removes_it() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        let alive = Arc::new(Mutex::new(HashSet::new()));
        let lock = loc.lock_with(probe(100, &alive));

        assert!(lock.can_lock());
        assert!(!lock.is_locked().unwrap());
        lock.obtain().unwrap();
        assert!(lock.is_owned().unwrap());
        assert_eq!(
            fs::read_to_string(temp.path().join(TDB_LOCK_FILE)).unwrap(),
            "100\n"
        );

        // obtaining twice is a no-op
        lock.obtain().unwrap();

        lock.release().unwrap();
        assert!(!temp.path().join(TDB_LOCK_FILE).exists());
        assert!(!lock.is_locked().unwrap());
    }

    #[test]
    fn live_owner_blocks_other_process() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        let alive = Arc::new(Mutex::new(HashSet::new()));
        let a = loc.lock_with(probe(100, &alive));
        let b = loc.lock_with(probe(200, &alive));

        a.obtain().unwrap();
        assert!(!b.can_obtain().unwrap());
        let err = b.obtain().unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::LockContention);
        assert!(matches!(err, CoreError::LocationLocked { pid: 100, .. }));

        let err = b.release().unwrap_err();
        assert!(matches!(err, CoreError::LockNotOwned { owner: 100, .. }));
    }

    #[test]
    fn dead_owner_is_reclaimed() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        let alive = Arc::new(Mutex::new(HashSet::new()));
        let a = loc.lock_with(probe(100, &alive));
        let b = loc.lock_with(probe(200, &alive));

        a.obtain().unwrap();
        alive.lock().remove(&100);

        assert!(b.can_obtain().unwrap());
        b.obtain().unwrap();
        assert_eq!(b.owner().unwrap(), Some(200));
        assert!(!a.is_owned().unwrap());
    }

    #[test]
    fn release_of_dead_owners_lock_fails() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        fs::write(temp.path().join(TDB_LOCK_FILE), "999\n").unwrap();
        let alive = Arc::new(Mutex::new(HashSet::new()));
        let lock = loc.lock_with(probe(100, &alive));

        assert!(lock.release().is_err());
        assert!(temp.path().join(TDB_LOCK_FILE).exists());
    }

    #[test]
    fn corrupt_lock_file_is_reported() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        fs::write(temp.path().join(TDB_LOCK_FILE), "not-a-pid").unwrap();
        let alive = Arc::new(Mutex::new(HashSet::new()));
        let lock = loc.lock_with(probe(100, &alive));

        let err = lock.obtain().unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::LockCorrupt);
        assert_eq!(lock.owner().unwrap_err().kind(), CoreErrorKind::LockCorrupt);
    }

    #[test]
    fn memory_locations_are_never_locked() {
        let lock = Location::mem().lock();
        assert!(!lock.can_lock());
        assert!(!lock.can_obtain().unwrap());
        lock.obtain().unwrap();
        assert!(!lock.is_locked().unwrap());
        lock.release().unwrap();
    }

    #[test]
    fn real_process_lock_round_trip() {
        let temp = tempdir().unwrap();
        let loc = Location::create(temp.path()).unwrap();
        let lock = loc.lock();
        lock.obtain().unwrap();
        assert_eq!(lock.owner().unwrap(), Some(std::process::id()));
        lock.release().unwrap();
    }
}
