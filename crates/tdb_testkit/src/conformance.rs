//! Behaviour every block store must share.
//!
//! Each check takes a fresh, empty store and panics on the first
//! deviation. Run them all with [`run_conformance`].

use crate::fixtures::{StoreKind, TestStore};
use tdb_storage::{Block, BlockAccess, ByteOrder, ErrorKind};

/// Fills a fresh block with a pattern derived from `seed`.
pub fn patterned_block(id: u64, block_size: usize, seed: u8) -> Block {
    let bytes = (0..block_size)
        .map(|i| seed.wrapping_add((i % 251) as u8))
        .collect();
    Block::new(id, bytes)
}

/// A new store is empty and has no valid ids.
pub fn check_fresh_store(store: &dyn BlockAccess) {
    assert!(store.is_empty(), "{}: fresh store not empty", store.label());
    assert_eq!(store.num_blocks(), 0);
    assert_eq!(store.allocations(), 0);
    assert!(!store.valid(0));
}

/// Allocation hands out 0, 1, 2, ... with full-size zero-length-agnostic
/// blocks.
pub fn check_sequential_allocation(store: &dyn BlockAccess) {
    for expected in 0..5u64 {
        let block = store.allocate(0).expect("allocate failed");
        assert_eq!(block.id(), expected, "{}: allocation order", store.label());
        assert_eq!(block.len(), store.block_size());
        assert!(store.valid(expected));
    }
    let explicit = store.allocate(store.block_size()).expect("allocate failed");
    assert_eq!(explicit.id(), 5);
    assert_eq!(store.allocations(), 6);
    assert_eq!(store.num_blocks(), 6);
}

/// Written blocks read back byte for byte, and the store stops being empty.
pub fn check_round_trip(store: &dyn BlockAccess) {
    let size = store.block_size();
    for seed in 0..3u8 {
        let id = store.allocate(0).expect("allocate failed").id();
        store
            .write(&patterned_block(id, size, seed))
            .expect("write failed");
    }
    assert!(!store.is_empty());
    for seed in 0..3u8 {
        let read = store.read(u64::from(seed)).expect("read failed");
        assert_eq!(read.id(), u64::from(seed));
        assert_eq!(read.bytes(), patterned_block(0, size, seed).bytes());
    }

    // later writes replace earlier ones
    store.write(&patterned_block(1, size, 9)).expect("write failed");
    assert_eq!(
        store.read(1).expect("read failed").bytes(),
        patterned_block(1, size, 9).bytes()
    );
}

/// Ids at or past the end are rejected by `read` and `write`.
pub fn check_bounds(store: &dyn BlockAccess) {
    let size = store.block_size();
    let err = store.read(0).expect_err("read of empty store");
    assert_eq!(err.kind(), ErrorKind::Bounds);

    let id = store.allocate(0).expect("allocate failed").id();
    store.write(&patterned_block(id, size, 1)).expect("write failed");

    let err = store.read(1).expect_err("read past end");
    assert_eq!(err.kind(), ErrorKind::Bounds);
    let err = store
        .write(&patterned_block(1, size, 1))
        .expect_err("write past end");
    assert_eq!(err.kind(), ErrorKind::Bounds);
    let err = store.read(u64::MAX).expect_err("read of huge id");
    assert_eq!(err.kind(), ErrorKind::Bounds);
}

/// `overwrite` may target ids past the end and extends the valid range.
pub fn check_overwrite_extends(store: &dyn BlockAccess) {
    let size = store.block_size();
    store
        .overwrite(&patterned_block(3, size, 7))
        .expect("overwrite failed");
    assert_eq!(store.num_blocks(), 4);
    assert!(store.valid(3));
    assert!(!store.is_empty());
    assert_eq!(
        store.read(3).expect("read failed").bytes(),
        patterned_block(3, size, 7).bytes()
    );

    // the gap reads back as zeros
    assert!(store.read(1).expect("read of gap").bytes().iter().all(|b| *b == 0));

    // allocation continues after the overwritten id
    assert_eq!(store.allocate(0).expect("allocate failed").id(), 4);
}

/// Blocks of the wrong size or byte order are geometry errors.
pub fn check_geometry(store: &dyn BlockAccess) {
    let size = store.block_size();
    let err = store.allocate(size + 1).expect_err("odd allocation size");
    assert_eq!(err.kind(), ErrorKind::Geometry);

    let id = store.allocate(0).expect("allocate failed").id();
    let short = Block::new(id, vec![0; size - 1]);
    assert_eq!(store.write(&short).unwrap_err().kind(), ErrorKind::Geometry);
    assert_eq!(
        store.overwrite(&short).unwrap_err().kind(),
        ErrorKind::Geometry
    );

    let little = Block::with_order(id, vec![0; size], ByteOrder::LittleEndian);
    assert_eq!(store.write(&little).unwrap_err().kind(), ErrorKind::Geometry);
}

/// Every operation fails after `close`, including a second `close`.
pub fn check_close(store: &dyn BlockAccess) {
    let size = store.block_size();
    let id = store.allocate(0).expect("allocate failed").id();
    store.write(&patterned_block(id, size, 1)).expect("write failed");
    store.sync().expect("sync failed");
    store.close().expect("close failed");

    assert_eq!(store.allocate(0).unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(store.read(0).unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(
        store.write(&patterned_block(0, size, 1)).unwrap_err().kind(),
        ErrorKind::Closed
    );
    assert_eq!(
        store
            .overwrite(&patterned_block(0, size, 1))
            .unwrap_err()
            .kind(),
        ErrorKind::Closed
    );
    assert_eq!(store.sync().unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(store.close().unwrap_err().kind(), ErrorKind::Closed);
}

/// Mutating a block after writing it, or a block returned by `read`, does
/// not change what the store holds.
pub fn check_isolation(store: &dyn BlockAccess) {
    let size = store.block_size();
    let mut block = store.allocate(0).expect("allocate failed");
    block.bytes_mut().expect("writable block").fill(1);
    store.write(&block).expect("write failed");

    block.bytes_mut().expect("writable block").fill(2);
    let mut read = store.read(0).expect("read failed");
    assert!(read.bytes().iter().all(|b| *b == 1));

    read.bytes_mut().expect("writable block").fill(3);
    assert!(store
        .read(0)
        .expect("read failed")
        .bytes()
        .iter()
        .all(|b| *b == 1));
    assert_eq!(read.len(), size);
}

/// Runs every check against fresh stores of `kind`.
pub fn run_conformance(kind: StoreKind, block_size: usize) {
    let checks: [(&str, fn(&dyn BlockAccess)); 8] = [
        ("fresh", check_fresh_store),
        ("allocation", check_sequential_allocation),
        ("round trip", check_round_trip),
        ("bounds", check_bounds),
        ("overwrite", check_overwrite_extends),
        ("geometry", check_geometry),
        ("close", check_close),
        ("isolation", check_isolation),
    ];
    for (name, check) in checks {
        let store = TestStore::new(kind, block_size);
        eprintln!("conformance: {kind} {name}");
        check(&*store);
    }
}
