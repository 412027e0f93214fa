//! Test fixtures: block stores, locations and simulated processes.
//!
//! File-backed fixtures live in a temporary directory that is removed when
//! the fixture is dropped.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tdb_core::{Location, LocationLock, ProcessProbe};
use tdb_storage::{BlockAccess, CopyMode, DirectBlockAccess, MappedBlockAccess, MemBlockAccess};
use tempfile::TempDir;

/// Segment size used by mapped fixtures, small enough that tests cross
/// segment boundaries quickly.
pub const TEST_SEGMENT_SIZE: usize = 4096;

/// The block store implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// [`DirectBlockAccess`]
    Direct,
    /// [`MappedBlockAccess`] with [`TEST_SEGMENT_SIZE`] segments
    Mapped,
    /// [`MemBlockAccess`] in copy mode
    Mem,
    /// [`MemBlockAccess`] in share mode
    MemShared,
}

impl StoreKind {
    /// Every implementation.
    pub const ALL: [StoreKind; 4] = [Self::Direct, Self::Mapped, Self::Mem, Self::MemShared];

    /// The file-backed implementations.
    pub const FILES: [StoreKind; 2] = [Self::Direct, Self::Mapped];

    /// Returns true for file-backed kinds.
    pub fn is_file(self) -> bool {
        matches!(self, Self::Direct | Self::Mapped)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Mapped => "mapped",
            Self::Mem => "mem",
            Self::MemShared => "mem-shared",
        };
        f.write_str(name)
    }
}

/// A block store with automatic cleanup.
pub struct TestStore {
    /// The store under test.
    pub store: Box<dyn BlockAccess>,
    kind: StoreKind,
    block_size: usize,
    path: Option<PathBuf>,
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an empty store of `kind`.
    pub fn new(kind: StoreKind, block_size: usize) -> Self {
        if kind.is_file() {
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let path = temp_dir.path().join("test.dat");
            let store = open_file_store(kind, &path, block_size);
            Self {
                store,
                kind,
                block_size,
                path: Some(path),
                _temp_dir: Some(temp_dir),
            }
        } else {
            let mode = if kind == StoreKind::MemShared {
                CopyMode::Share
            } else {
                CopyMode::Copy
            };
            let store = MemBlockAccess::new(kind.to_string(), block_size, mode)
                .expect("Failed to create memory store");
            Self {
                store: Box::new(store),
                kind,
                block_size,
                path: None,
                _temp_dir: None,
            }
        }
    }

    /// Opens a file-backed store over an existing file.
    pub fn open(kind: StoreKind, path: &Path, block_size: usize) -> Box<dyn BlockAccess> {
        assert!(kind.is_file(), "{kind} stores have no file");
        open_file_store(kind, path, block_size)
    }

    /// Returns the implementation under test.
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Returns the block file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Syncs and closes the store, then opens the same file again.
    ///
    /// # Panics
    ///
    /// Panics for memory stores, which do not survive closing.
    pub fn reopen(self) -> Self {
        let path = self.path.clone().expect("memory stores cannot be reopened");
        self.store.sync().expect("Failed to sync before reopen");
        self.store.close().expect("Failed to close before reopen");
        let store = open_file_store(self.kind, &path, self.block_size);
        Self { store, ..self }
    }
}

impl fmt::Debug for TestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStore")
            .field("kind", &self.kind)
            .field("block_size", &self.block_size)
            .field("path", &self.path)
            .finish()
    }
}

impl std::ops::Deref for TestStore {
    type Target = dyn BlockAccess;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

fn open_file_store(kind: StoreKind, path: &Path, block_size: usize) -> Box<dyn BlockAccess> {
    match kind {
        StoreKind::Direct => Box::new(
            DirectBlockAccess::open(path, block_size).expect("Failed to open direct store"),
        ),
        StoreKind::Mapped => {
            let file = Arc::new(
                tdb_storage::FileBase::open(path).expect("Failed to open block file"),
            );
            Box::new(
                MappedBlockAccess::with_segment_size(file, block_size, TEST_SEGMENT_SIZE)
                    .expect("Failed to open mapped store"),
            )
        }
        StoreKind::Mem | StoreKind::MemShared => unreachable!("not a file store"),
    }
}

/// Runs `f` once against a fresh store of every kind.
pub fn with_each_store<F>(block_size: usize, mut f: F)
where
    F: FnMut(&TestStore),
{
    for kind in StoreKind::ALL {
        let store = TestStore::new(kind, block_size);
        f(&store);
    }
}

/// A directory location with automatic cleanup.
#[derive(Debug)]
pub struct TempLocation {
    /// The location.
    pub location: Location,
    temp_dir: TempDir,
}

impl TempLocation {
    /// Creates a location in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let location = Location::create(temp_dir.path()).expect("Failed to create location");
        Self { location, temp_dir }
    }

    /// Returns the directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Default for TempLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempLocation {
    type Target = Location;

    fn deref(&self) -> &Self::Target {
        &self.location
    }
}

/// A set of pretend processes sharing one notion of which are alive.
///
/// Each [`SimulatedProcesses::probe`] answers as one process, so several
/// "processes" can contend for a lock within a single test.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProcesses {
    alive: Arc<Mutex<HashSet<u32>>>,
}

impl SimulatedProcesses {
    /// Creates an empty process table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts process `pid` and returns a probe that acts as it.
    pub fn probe(&self, pid: u32) -> Arc<dyn ProcessProbe> {
        self.start(pid);
        Arc::new(SimulatedProbe {
            pid,
            alive: Arc::clone(&self.alive),
        })
    }

    /// Returns the lock of `location` as seen by process `pid`.
    pub fn lock(&self, location: &Location, pid: u32) -> LocationLock {
        location.lock_with(self.probe(pid))
    }

    /// Marks `pid` alive.
    pub fn start(&self, pid: u32) {
        self.alive.lock().expect("process table poisoned").insert(pid);
    }

    /// Marks `pid` dead.
    pub fn kill(&self, pid: u32) {
        self.alive.lock().expect("process table poisoned").remove(&pid);
    }
}

#[derive(Debug)]
struct SimulatedProbe {
    pid: u32,
    alive: Arc<Mutex<HashSet<u32>>>,
}

impl ProcessProbe for SimulatedProbe {
    fn current_pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().expect("process table poisoned").contains(&pid)
    }
}
