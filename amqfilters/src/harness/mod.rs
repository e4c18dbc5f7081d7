// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Timing and accuracy measurement over filters.
//!
//! [`run_workload`] replays an operation stream against one filter on the
//! calling thread and records per-operation latency. [`run_threaded`] replays
//! a mix across a pool of scoped worker threads and reports aggregate
//! throughput.

mod stats;
mod threaded;

use std::hint::black_box;
use std::time::Instant;

pub use self::stats::Summary;
pub use self::stats::mean;
pub use self::stats::quantile;
pub use self::stats::stddev;
pub use self::threaded::ThreadedResult;
pub use self::threaded::ThreadedRun;
pub use self::threaded::WriteSync;
pub use self::threaded::run_threaded;

use crate::error::OpError;
use crate::filter::Filter;
use crate::filter::Key;
use crate::workload::Operation;

/// How [`run_workload`] treats write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Apply inserts and deletes to the filter. When false they are timed as queries.
    pub apply_writes: bool,
}

impl RunOptions {
    /// Options that apply writes only for filters that support both insert and erase.
    pub fn for_filter<F: Filter>(filter: &F) -> Self {
        RunOptions {
            apply_writes: filter.kind().is_dynamic(),
        }
    }
}

/// Outcome of one workload run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    pub ops: usize,
    pub seconds: f64,
    pub ops_per_sec: f64,
    pub p50_ns: f64,
    pub p95_ns: f64,
    pub p99_ns: f64,
    /// Inserts rejected with [`OpError::CapacityExhausted`].
    pub failed_inserts: u64,
    /// Writes rejected with [`OpError::Unsupported`].
    pub unsupported_ops: u64,
    pub negative_queries: u64,
    /// Negative queries answered `true`.
    pub false_positives: u64,
}

/// Replays `ops` against `filter`, timing each operation.
///
/// Failed writes are counted, never propagated.
pub fn run_workload<F: Filter>(
    filter: &mut F,
    ops: &[Operation],
    options: RunOptions,
) -> RunResult {
    let mut result = RunResult {
        ops: ops.len(),
        ..RunResult::default()
    };
    let mut latencies = Vec::with_capacity(ops.len());

    let start = Instant::now();
    for op in ops {
        let t0 = Instant::now();
        if op.is_write() && !options.apply_writes {
            let _ = black_box(filter.contains(op.key()));
        } else {
            match *op {
                Operation::Query {
                    key,
                    expect_present,
                } => {
                    let hit = black_box(filter.contains(key));
                    if !expect_present {
                        result.negative_queries += 1;
                        if hit {
                            result.false_positives += 1;
                        }
                    }
                }
                Operation::Insert(key) => record_write(&mut result, filter.insert(key)),
                Operation::Delete(key) => record_write(&mut result, filter.erase(key).map(|_| ())),
            }
        }
        latencies.push(t0.elapsed().as_nanos() as f64);
    }
    result.seconds = start.elapsed().as_secs_f64();

    if result.seconds > 0.0 {
        result.ops_per_sec = result.ops as f64 / result.seconds;
    }
    result.p50_ns = quantile(&mut latencies, 0.50);
    result.p95_ns = quantile(&mut latencies, 0.95);
    result.p99_ns = quantile(&mut latencies, 0.99);
    result
}

fn record_write(result: &mut RunResult, outcome: Result<(), OpError>) {
    match outcome {
        Ok(()) => {}
        Err(OpError::CapacityExhausted) => result.failed_inserts += 1,
        Err(OpError::Unsupported) => result.unsupported_ops += 1,
    }
}

/// Fraction of `negatives` the filter reports as present; 0 for an empty set.
pub fn measure_false_positive_rate<F: Filter + ?Sized>(filter: &F, negatives: &[Key]) -> f64 {
    if negatives.is_empty() {
        return 0.0;
    }
    let hits = negatives
        .iter()
        .filter(|&&key| filter.contains(key))
        .count();
    hits as f64 / negatives.len() as f64
}

/// `bytes_used * 8 / entries`; 0 when `entries` is 0.
pub fn bits_per_entry<F: Filter + ?Sized>(filter: &F, entries: usize) -> f64 {
    if entries == 0 {
        return 0.0;
    }
    filter.bytes_used() as f64 * 8.0 / entries as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::BlockedBloomFilter;
    use crate::cuckoo::CuckooFilter;
    use crate::workload::WorkloadGenerator;
    use crate::workload::WorkloadType;
    use crate::workload::make_disjoint_keys;
    use crate::xor::XorFilter;

    #[test]
    fn test_run_counts_negatives() {
        let (pos, neg) = make_disjoint_keys(1_000, 11);
        let mut filter = BlockedBloomFilter::builder()
            .with_accuracy(1_000, 0.01)
            .build()
            .unwrap();
        for &key in &pos {
            filter.insert(key).unwrap();
        }
        let ops = WorkloadGenerator::new(WorkloadType::ReadOnly.mix(), 1.0, 3)
            .unwrap()
            .generate(2_000, &pos, &neg)
            .unwrap();

        let options = RunOptions::for_filter(&filter);
        let result = run_workload(&mut filter, &ops, options);
        assert_eq!(result.ops, 2_000);
        assert_eq!(result.negative_queries, 2_000);
        assert!(result.false_positives < 100);
        assert!(result.p50_ns <= result.p95_ns);
        assert!(result.p95_ns <= result.p99_ns);
        assert!(result.seconds > 0.0);
    }

    #[test]
    fn test_writes_on_static_filter() {
        let (pos, neg) = make_disjoint_keys(100, 1);
        let mut filter = XorFilter::builder().max_attempts(10).build(&pos).unwrap();
        let ops = [Operation::Insert(neg[0]), Operation::Delete(pos[0])];

        let result = run_workload(&mut filter, &ops, RunOptions { apply_writes: true });
        assert_eq!(result.unsupported_ops, 2);

        let options = RunOptions::for_filter(&filter);
        let result = run_workload(&mut filter, &ops, options);
        assert_eq!(result.unsupported_ops, 0);
        assert!(filter.contains(pos[0]));
    }

    #[test]
    fn test_writes_on_dynamic_filter() {
        let mut filter = CuckooFilter::builder()
            .with_accuracy(100, 0.01)
            .build()
            .unwrap();
        let ops = [Operation::Insert(5), Operation::Insert(6), Operation::Delete(5)];
        let options = RunOptions::for_filter(&filter);
        let result = run_workload(&mut filter, &ops, options);
        assert_eq!(result.failed_inserts, 0);
        assert!(filter.contains(6));
        assert_eq!(filter.insert_calls(), 2);

        let ops = [Operation::Insert(7), Operation::Delete(6)];
        let result = run_workload(&mut filter, &ops, RunOptions::default());
        assert_eq!(result.ops, 2);
        assert_eq!(filter.insert_calls(), 2);
        assert!(filter.contains(6));
    }

    #[test]
    fn test_space_and_fpr_helpers() {
        let filter = BlockedBloomFilter::builder()
            .with_accuracy(1_000, 0.01)
            .build()
            .unwrap();
        assert_eq!(measure_false_positive_rate(&filter, &[1, 2, 3]), 0.0);
        assert_eq!(measure_false_positive_rate(&filter, &[]), 0.0);
        assert_eq!(bits_per_entry(&filter, 1_000), 19.0 * 512.0 / 1_000.0);
        assert_eq!(bits_per_entry(&filter, 0), 0.0);
    }
}
