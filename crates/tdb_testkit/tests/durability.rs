//! Block files keep their contents across close and reopen.

use tdb_storage::{Block, BlockAccess, DirectBlockAccess, MappedBlockAccess, DEFAULT_BLOCK_SIZE};
use tdb_testkit::prelude::*;
use tempfile::TempDir;

#[test]
fn written_blocks_survive_reopen() {
    for kind in StoreKind::FILES {
        let store = TestStore::new(kind, 128);
        for seed in 0..10u8 {
            let id = store.allocate(0).unwrap().id();
            store.write(&patterned_block(id, 128, seed)).unwrap();
        }

        let store = store.reopen();
        assert!(!store.is_empty(), "{kind}");
        assert!(store.num_blocks() >= 10, "{kind}");
        for seed in 0..10u8 {
            assert_eq!(
                store.read(u64::from(seed)).unwrap().bytes(),
                patterned_block(0, 128, seed).bytes(),
                "{kind} block {seed}"
            );
        }
    }
}

#[test]
fn direct_reopen_continues_allocation() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("SPO.idn");

    let store = DirectBlockAccess::open(&path, DEFAULT_BLOCK_SIZE).unwrap();
    let block = store.allocate(0).unwrap();
    store
        .write(&Block::new(block.id(), vec![0xAA; DEFAULT_BLOCK_SIZE]))
        .unwrap();
    store.close().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), DEFAULT_BLOCK_SIZE as u64);

    let store = DirectBlockAccess::open(&path, DEFAULT_BLOCK_SIZE).unwrap();
    assert!(!store.is_empty());
    assert!(store.read(0).unwrap().bytes().iter().all(|b| *b == 0xAA));
    assert_eq!(store.allocate(0).unwrap().id(), 1);
}

#[test]
fn ragged_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.idn");
    std::fs::write(&path, vec![0u8; 100]).unwrap();

    for kind in StoreKind::FILES {
        let err = match kind {
            StoreKind::Direct => DirectBlockAccess::open(&path, 64).map(|_| ()),
            _ => MappedBlockAccess::open(&path, 64).map(|_| ()),
        }
        .unwrap_err();
        assert_eq!(err.kind(), tdb_storage::ErrorKind::Geometry, "{kind}");
    }
}

#[test]
fn mapped_flushes_only_dirty_segments() {
    let store = TestStore::new(StoreKind::Mapped, 1024);
    let blocks_per_segment = (TEST_SEGMENT_SIZE / 1024) as u64;

    // fill two segments
    for id in 0..blocks_per_segment * 2 {
        let block = store.allocate(0).unwrap();
        store.write(&patterned_block(block.id(), 1024, id as u8)).unwrap();
    }
    store.sync().unwrap();

    // touch only the second segment, then reopen
    store
        .write(&patterned_block(blocks_per_segment, 1024, 0xEE))
        .unwrap();
    let store = store.reopen();
    assert_eq!(
        store.read(blocks_per_segment).unwrap().bytes(),
        patterned_block(0, 1024, 0xEE).bytes()
    );
    assert_eq!(
        store.read(0).unwrap().bytes(),
        patterned_block(0, 1024, 0).bytes()
    );
}

#[test]
fn overwrite_gap_reads_zero_after_reopen() {
    for kind in StoreKind::FILES {
        let store = TestStore::new(kind, 256);
        store.overwrite(&patterned_block(5, 256, 3)).unwrap();
        let store = store.reopen();
        assert!(store.read(2).unwrap().bytes().iter().all(|b| *b == 0), "{kind}");
        assert_eq!(
            store.read(5).unwrap().bytes(),
            patterned_block(0, 256, 3).bytes()
        );
    }
}
