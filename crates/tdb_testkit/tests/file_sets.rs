//! File sets, metadata and the file factory working together.

use tdb_core::names::{EXT_BPT_RECORDS, EXT_BPT_TREE};
use tdb_core::{CopyMode, FileFactory, FileMode, FileSet, Location, StoreConfig};
use tdb_testkit::prelude::*;

fn factory(mode: FileMode) -> FileFactory {
    FileFactory::new(StoreConfig::new().block_size(512).file_mode(mode)).unwrap()
}

#[test]
fn index_files_and_metadata_persist() {
    for mode in [FileMode::Direct, FileMode::Mapped] {
        let dir = TempLocation::new();
        {
            let factory = factory(mode);
            let spo = FileSet::new(dir.location.clone(), "SPO");
            let nodes = factory.block_access(&spo, EXT_BPT_TREE).unwrap();
            let records = factory.block_access(&spo, EXT_BPT_RECORDS).unwrap();

            let id = nodes.allocate(0).unwrap().id();
            nodes.write(&patterned_block(id, 512, 1)).unwrap();
            let id = records.allocate(0).unwrap().id();
            records.write(&patterned_block(id, 512, 2)).unwrap();

            let meta = spo.meta_file().unwrap();
            meta.check_or_set("tdb.file.blocksize", "512").unwrap();
            meta.set_property_int("tdb.bplustree.order", 31);

            nodes.sync().unwrap();
            records.sync().unwrap();
            spo.flush_meta().unwrap();
            factory.close().unwrap();
        }

        let factory = factory(mode);
        let spo = FileSet::new(dir.location.clone(), "SPO");
        assert!(spo.exists(EXT_BPT_TREE) && spo.exists(EXT_BPT_RECORDS) && spo.exists_meta());

        let meta = spo.meta_file().unwrap();
        meta.check_or_set("tdb.file.blocksize", "512").unwrap();
        assert_eq!(meta.property_as_int("tdb.bplustree.order").unwrap(), Some(31));

        let nodes = factory.block_access(&spo, EXT_BPT_TREE).unwrap();
        assert_eq!(
            nodes.read(0).unwrap().bytes(),
            patterned_block(0, 512, 1).bytes(),
            "{mode}"
        );
    }
}

#[test]
fn journal_channel_round_trip() {
    let dir = TempLocation::new();
    let factory = factory(FileMode::Direct);
    {
        let mut journal = factory.journal_channel(&dir).unwrap();
        journal.write(b"commit 1\n").unwrap();
        journal.sync().unwrap();
    }
    assert!(factory.journal_channel(&dir).is_err());
    factory.release_journal(&dir).unwrap();

    let mut journal = factory.journal_channel(&dir).unwrap();
    assert_eq!(journal.size().unwrap(), 9);
    let mut buf = [0u8; 9];
    assert_eq!(journal.read(&mut buf).unwrap(), Some(9));
    assert_eq!(&buf, b"commit 1\n");
}

#[test]
fn memory_store_through_factory() {
    let factory =
        FileFactory::new(StoreConfig::new().block_size(64).copy_mode(CopyMode::Share)).unwrap();
    let spo = FileSet::new(Location::mem(), "SPO");
    let store = factory.block_access(&spo, EXT_BPT_TREE).unwrap();
    check_round_trip(store.as_ref());

    spo.set_property("k", "v").unwrap();
    spo.flush_meta().unwrap();
    assert!(!spo.exists_meta());
}
