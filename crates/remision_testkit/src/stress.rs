//! Stress helpers for concurrent issuing.
//!
//! These helpers hammer one ledger from several threads and report how
//! many documents were issued and whether the numbering stayed contiguous.

use crate::fixtures::{fast_config, scenarios, SharedLedger};
use remision_core::{CoreError, Issuer, LedgerConfig, SequenceNumber};
use std::collections::BTreeSet;
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
    /// Failures that were retry exhaustion.
    pub exhausted_ops: usize,
    /// Numbers handed out, in no particular order.
    pub issued: Vec<SequenceNumber>,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(issued: Vec<SequenceNumber>, errors: &[CoreError], duration: Duration) -> Self {
        let successful = issued.len();
        let failed = errors.len();
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
            exhausted_ops: errors
                .iter()
                .filter(|e| matches!(e, CoreError::ConcurrencyExhausted { .. }))
                .count(),
            issued,
            duration,
            ops_per_second,
        }
    }

    /// Returns true if no number was handed out twice.
    pub fn all_distinct(&self) -> bool {
        let unique: BTreeSet<_> = self.issued.iter().collect();
        unique.len() == self.issued.len()
    }

    /// Returns true if the issued numbers are exactly `start+1..=start+n`.
    pub fn contiguous_from(&self, start: SequenceNumber) -> bool {
        let mut numbers: Vec<u64> = self.issued.iter().map(|n| n.as_u64()).collect();
        numbers.sort_unstable();
        numbers
            .iter()
            .enumerate()
            .all(|(i, n)| *n == start.as_u64() + i as u64 + 1)
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {} ({} exhausted)", self.failed_ops, self.exhausted_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Documents each thread issues.
    pub issues_per_thread: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Issuer configuration.
    pub ledger: LedgerConfig,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            issues_per_thread: 10,
            threads: 4,
            ledger: fast_config(),
        }
    }
}

/// Issues documents from `config.threads` threads at once.
///
/// Every thread gets its own [`Issuer`] over the shared adapter, the way
/// independent clients would.
pub fn stress_concurrent_issues(ledger: &SharedLedger, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let issuer = Issuer::with_config(Arc::clone(ledger), config.ledger.clone());
            let count = config.issues_per_thread;
            thread::spawn(move || {
                let mut issued = Vec::new();
                let mut errors = Vec::new();
                for i in 0..count {
                    match issuer.issue(&scenarios::draft(&format!("Cliente {t}-{i}"))) {
                        Ok(record) => issued.push(record.number),
                        Err(e) => errors.push(e),
                    }
                }
                (issued, errors)
            })
        })
        .collect();

    let mut issued = Vec::new();
    let mut errors = Vec::new();
    for handle in handles {
        let (ok, failed) = handle.join().expect("stress thread panicked");
        issued.extend(ok);
        errors.extend(failed);
    }

    StressTestResult::new(issued, &errors, start.elapsed())
}

/// Issues `count` documents one after another from a single issuer.
pub fn stress_sequential_issues(ledger: &SharedLedger, count: usize) -> StressTestResult {
    let issuer = Issuer::with_config(Arc::clone(ledger), fast_config());
    let start = Instant::now();
    let mut issued = Vec::new();
    let mut errors = Vec::new();

    for i in 0..count {
        match issuer.issue(&scenarios::draft(&format!("Cliente {i}"))) {
            Ok(record) => issued.push(record.number),
            Err(e) => errors.push(e),
        }
    }

    StressTestResult::new(issued, &errors, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{LedgerKind, TestLedger};

    #[test]
    fn sequential_is_contiguous() {
        let ledger = TestLedger::new(LedgerKind::MemorySplit);
        let result = stress_sequential_issues(&ledger.adapter(), 20);
        assert_eq!(result.successful_ops, 20);
        assert!(result.contiguous_from(SequenceNumber::ZERO));
    }

    #[test]
    fn concurrent_in_memory() {
        for kind in [LedgerKind::MemorySplit, LedgerKind::MemoryCombined] {
            let ledger = TestLedger::new(kind);
            let config = StressConfig {
                issues_per_thread: 5,
                threads: 4,
                ..StressConfig::default()
            };
            let result = stress_concurrent_issues(&ledger.adapter(), &config);
            assert_eq!(result.failed_ops, 0, "{kind:?}");
            assert!(result.all_distinct(), "{kind:?}");
            assert!(result.contiguous_from(SequenceNumber::ZERO), "{kind:?}");
            assert_eq!(ledger.records().len(), 20, "{kind:?}");
        }
    }

    #[test]
    fn result_math() {
        let numbers = vec![SequenceNumber::new(3).unwrap(), SequenceNumber::new(2).unwrap()];
        let result = StressTestResult::new(numbers, &[CoreError::ConcurrencyExhausted { attempts: 3 }], Duration::ZERO);
        assert_eq!(result.total_ops, 3);
        assert_eq!(result.exhausted_ops, 1);
        assert!(result.contiguous_from(SequenceNumber::new(1).unwrap()));
        assert_eq!(result.ops_per_second, 0.0);
    }
}
