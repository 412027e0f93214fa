//! Location locks between simulated processes.

use std::fs;
use tdb_core::names::TDB_LOCK_FILE;
use tdb_core::{CoreError, CoreErrorKind, Location};
use tdb_testkit::prelude::*;

#[test]
fn second_process_is_refused_until_owner_releases() {
    let dir = TempLocation::new();
    let processes = SimulatedProcesses::new();
    let first = processes.lock(&dir, 1000);
    let second = processes.lock(&dir, 2000);

    first.obtain().unwrap();
    let err = second.obtain().unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::LockContention);
    assert!(err.to_string().contains("1000"));

    first.release().unwrap();
    second.obtain().unwrap();
    assert_eq!(second.owner().unwrap(), Some(2000));
}

#[test]
fn crashed_owner_is_replaced() {
    let dir = TempLocation::new();
    let processes = SimulatedProcesses::new();
    processes.lock(&dir, 1000).obtain().unwrap();
    processes.kill(1000);

    let survivor = processes.lock(&dir, 2000);
    assert!(survivor.can_obtain().unwrap());
    survivor.obtain().unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join(TDB_LOCK_FILE)).unwrap().trim(),
        "2000"
    );
}

#[test]
fn empty_lock_file_counts_as_unlocked() {
    let dir = TempLocation::new();
    fs::write(dir.path().join(TDB_LOCK_FILE), "").unwrap();
    let lock = SimulatedProcesses::new().lock(&dir, 7);

    assert!(!lock.is_locked().unwrap());
    lock.obtain().unwrap();
    assert!(lock.is_owned().unwrap());
}

#[test]
fn garbage_lock_file_is_corrupt() {
    let dir = TempLocation::new();
    fs::write(dir.path().join(TDB_LOCK_FILE), "pid=12").unwrap();
    let err = SimulatedProcesses::new().lock(&dir, 7).obtain().unwrap_err();
    assert!(matches!(err, CoreError::LockFileCorrupt { .. }));
}

#[test]
fn locks_follow_the_canonical_directory() {
    let dir = TempLocation::new();
    let processes = SimulatedProcesses::new();
    processes.lock(&dir, 1).obtain().unwrap();

    let same = Location::existing(dir.path().join(".")).unwrap();
    assert_eq!(same, dir.location);
    assert!(processes.lock(&same, 2).obtain().is_err());
}

#[test]
fn memory_locations_ignore_locking() {
    let processes = SimulatedProcesses::new();
    let loc = Location::mem_named("shared");
    processes.lock(&loc, 1).obtain().unwrap();
    processes.lock(&loc, 2).obtain().unwrap();
    assert!(!processes.lock(&loc, 1).is_locked().unwrap());
}
