//! Stress tests for dstore.
//!
//! These run concurrent writers, each on its own engine session, against one
//! keyspace and check that reconciliation still converges.

use crate::fixtures::{sample_product, ProductDocument, TestStore};
use dstore_core::{CoreResult, PersistGateway};
use dstore_engine::InMemoryEngine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Persists per thread.
    pub operations: usize,
    /// Number of concurrent writer threads.
    pub threads: usize,
    /// Number of distinct brands writers move products between.
    pub brand_count: u32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            brand_count: 5,
        }
    }
}

fn run_writers<F>(store: &TestStore, config: &StressConfig, write: F) -> StressTestResult
where
    F: Fn(&PersistGateway<InMemoryEngine>, usize, usize) -> CoreResult<()> + Send + Sync + 'static,
{
    let write = Arc::new(write);
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let gateway = store.session();
            let write = Arc::clone(&write);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    match write(&gateway, t, i) {
                        Ok(()) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Every thread keeps moving product `product_id` to another brand.
///
/// All writers contend on the same sentinels, so most persists retry.
pub fn stress_contended_brand_moves(
    store: &TestStore,
    product_id: u32,
    config: &StressConfig,
) -> StressTestResult {
    let brand_count = config.brand_count.max(1);
    run_writers(store, config, move |gateway, thread, i| {
        let brand_id = u32::try_from(thread * 31 + i).unwrap_or(0) % brand_count + 1;
        gateway.persist(&sample_product(product_id, brand_id))
    })
}

/// Every thread persists its own products, all sharing the same tags.
///
/// Product ids are `thread * operations + i + 1`.
pub fn stress_independent_products(store: &TestStore, config: &StressConfig) -> StressTestResult {
    let operations = config.operations;
    let brand_count = config.brand_count.max(1);
    run_writers(store, config, move |gateway, thread, i| {
        let id = u32::try_from(thread * operations + i + 1).unwrap_or(u32::MAX);
        let doc: ProductDocument = sample_product(id, id % brand_count + 1);
        gateway.persist(&doc)
    })
}
