//! Every block store implementation behaves the same.

use proptest::prelude::*;
use tdb_testkit::prelude::*;

#[test]
fn direct_conforms() {
    run_conformance(StoreKind::Direct, 128);
}

#[test]
fn mapped_conforms() {
    run_conformance(StoreKind::Mapped, 128);
}

#[test]
fn mapped_conforms_with_one_block_per_segment() {
    run_conformance(StoreKind::Mapped, TEST_SEGMENT_SIZE);
}

#[test]
fn mem_conforms() {
    run_conformance(StoreKind::Mem, 128);
}

#[test]
fn shared_mem_conforms() {
    run_conformance(StoreKind::MemShared, 128);
}

#[test]
fn concurrent_writers_never_see_torn_blocks() {
    let config = StressConfig {
        threads: 4,
        blocks_per_thread: 40,
    };
    with_each_store(256, |store| {
        let result = stress_concurrent_writers(&**store, &config);
        assert_eq!(result.failed_ops, 0, "{}", store.kind());
        assert_eq!(store.num_blocks(), 160);
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn implementations_agree(
        block_size in block_size_strategy(),
        ops in op_sequence_strategy(40, 80),
    ) {
        let reference = TestStore::new(StoreKind::Mem, block_size);
        let expected = apply_ops(&*reference, &ops);

        for kind in [StoreKind::Direct, StoreKind::Mapped, StoreKind::MemShared] {
            let store = TestStore::new(kind, block_size);
            let trace = apply_ops(&*store, &ops);
            prop_assert_eq!(&trace, &expected, "{} diverged", kind);
        }
    }
}
