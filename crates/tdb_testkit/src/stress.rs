//! Concurrency stress helpers for block stores.

use crate::conformance::patterned_block;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tdb_storage::BlockAccess;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Operations that failed.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Blocks each thread allocates, writes and verifies.
    pub blocks_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            blocks_per_thread: 64,
        }
    }
}

/// Has every thread allocate, write and read back its own blocks at once.
///
/// Each block's pattern is derived from its id, so a block read back with
/// another block's contents counts as a failure.
pub fn stress_concurrent_writers(store: &dyn BlockAccess, config: &StressConfig) -> StressTestResult {
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..config.threads {
            scope.spawn(|| {
                let size = store.block_size();
                let mut mine = Vec::with_capacity(config.blocks_per_thread);
                for _ in 0..config.blocks_per_thread {
                    let outcome = store.allocate(0).and_then(|block| {
                        let id = block.id();
                        store.write(&patterned_block(id, size, id as u8))?;
                        Ok(id)
                    });
                    match outcome {
                        Ok(id) => mine.push(id),
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                for id in mine {
                    let expected = patterned_block(id, size, id as u8);
                    match store.read(id) {
                        Ok(block) if block.bytes() == expected.bytes() => {}
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    StressTestResult {
        total_ops: config.threads * config.blocks_per_thread * 2,
        failed_ops: failed.load(Ordering::Relaxed),
        duration: start.elapsed(),
    }
}
