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

use std::hint::black_box;
use std::thread;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Error;
use crate::error::OpError;
use crate::filter::Filter;
use crate::filter::Key;
use crate::hash::RandomSource;
use crate::hash::SplitMix64;
use crate::workload::WorkloadMix;

const THREAD_SEED_BASE: u64 = 123_456_789;
const THREAD_SEED_STRIDE: u64 = 1337;

/// How concurrent workers synchronise writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteSync {
    /// No lock. Inserts and deletes are executed as queries.
    #[default]
    None,
    /// One reader-writer lock around the filter: queries share it, writes take it exclusively.
    Coarse,
}

/// Parameters of a multi-threaded run.
#[derive(Debug, Clone, Copy)]
pub struct ThreadedRun {
    pub threads: usize,
    pub total_ops: usize,
    pub mix: WorkloadMix,
    pub negative_share: f64,
    pub write_sync: WriteSync,
}

/// Aggregate outcome of a multi-threaded run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadedResult {
    pub threads: usize,
    /// Operations executed across all workers.
    pub ops: usize,
    pub seconds: f64,
    pub ops_per_sec: f64,
    pub failed_inserts: u64,
    pub unsupported_ops: u64,
}

#[derive(Debug, Default)]
struct WorkerTally {
    ops: usize,
    failed_inserts: u64,
    unsupported_ops: u64,
}

enum Access<'a, 'f, F> {
    Shared(&'a F),
    Coarse(&'a RwLock<&'f mut F>),
}

impl<F: Filter> Access<'_, '_, F> {
    fn contains(&self, key: Key) -> bool {
        match self {
            Access::Shared(filter) => filter.contains(key),
            Access::Coarse(lock) => lock.read().contains(key),
        }
    }

    /// Runs a write, or a query in its place when writes are not synchronised.
    fn write(&self, key: Key, erase: bool, tally: &mut WorkerTally) {
        let outcome = match self {
            Access::Shared(filter) => {
                let _ = black_box(filter.contains(key));
                return;
            }
            Access::Coarse(lock) => {
                let mut guard = lock.write();
                if erase {
                    guard.erase(key).map(|_| ())
                } else {
                    guard.insert(key)
                }
            }
        };
        match outcome {
            Ok(()) => {}
            Err(OpError::CapacityExhausted) => tally.failed_inserts += 1,
            Err(OpError::Unsupported) => tally.unsupported_ops += 1,
        }
    }
}

/// Replays `run.mix` on `run.threads` scoped worker threads and measures aggregate throughput.
///
/// Worker `t` executes a contiguous share of `total_ops` (the first
/// `total_ops % threads` workers get one extra) and draws its operation types
/// from its own generator seeded `123456789 + t * 1337`. Key cursors start at
/// the worker's first operation index.
///
/// With [`WriteSync::Coarse`] the filter is wrapped in a lock owned by this
/// call; a read-only mix never takes it.
///
/// # Errors
///
/// [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if `threads` is 0,
/// `negative_share` is outside `[0, 1]`, or the mix needs keys from an empty set.
pub fn run_threaded<F: Filter + Send + Sync>(
    filter: &mut F,
    run: &ThreadedRun,
    positives: &[Key],
    negatives: &[Key],
) -> Result<ThreadedResult, Error> {
    if run.threads == 0 {
        return Err(Error::config_invalid("threads must be at least 1"));
    }
    if !(0.0..=1.0).contains(&run.negative_share) {
        return Err(Error::config_invalid("negative_share must be in [0, 1]")
            .with_context("negative_share", run.negative_share));
    }
    if positives.is_empty() && (run.mix.has_writes() || run.negative_share < 1.0) {
        return Err(Error::config_invalid("threaded run needs positive keys"));
    }
    if negatives.is_empty() && run.mix.query() > 0.0 && run.negative_share > 0.0 {
        return Err(Error::config_invalid("threaded run needs negative keys"));
    }

    let locked = run.write_sync == WriteSync::Coarse && run.mix.has_writes();
    debug!(
        threads = run.threads,
        total_ops = run.total_ops,
        locked,
        "starting threaded run"
    );

    let start = Instant::now();
    let tallies = if locked {
        let lock = RwLock::new(filter);
        spawn_workers(&Access::Coarse(&lock), run, positives, negatives)
    } else {
        spawn_workers(&Access::Shared(&*filter), run, positives, negatives)
    };
    let seconds = start.elapsed().as_secs_f64();

    let mut result = ThreadedResult {
        threads: run.threads,
        seconds,
        ..ThreadedResult::default()
    };
    for tally in tallies {
        result.ops += tally.ops;
        result.failed_inserts += tally.failed_inserts;
        result.unsupported_ops += tally.unsupported_ops;
    }
    if seconds > 0.0 {
        result.ops_per_sec = result.ops as f64 / seconds;
    }
    Ok(result)
}

fn spawn_workers<F: Filter + Send + Sync>(
    access: &Access<'_, '_, F>,
    run: &ThreadedRun,
    positives: &[Key],
    negatives: &[Key],
) -> Vec<WorkerTally> {
    let per = run.total_ops / run.threads;
    let rem = run.total_ops % run.threads;

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(run.threads);
        let mut first_op = 0;
        for tid in 0..run.threads {
            let count = per + usize::from(tid < rem);
            handles.push(s.spawn(move || {
                worker(access, tid, first_op, count, run, positives, negatives)
            }));
            first_op += count;
        }
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(tally) => tally,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

fn worker<F: Filter>(
    access: &Access<'_, '_, F>,
    tid: usize,
    first_op: usize,
    count: usize,
    run: &ThreadedRun,
    positives: &[Key],
    negatives: &[Key],
) -> WorkerTally {
    let mut rng = SplitMix64::seeded(THREAD_SEED_BASE + tid as u64 * THREAD_SEED_STRIDE);
    let mut tally = WorkerTally {
        ops: count,
        ..WorkerTally::default()
    };
    let mut insert_cursor = first_op;
    let mut delete_cursor = first_op;
    let query_cut = run.mix.query();
    let insert_cut = query_cut + run.mix.insert();

    for i in 0..count {
        let r = rng.next_f64();
        if r < query_cut {
            let op_index = first_op + i;
            let key = if rng.next_f64() < run.negative_share {
                negatives[op_index % negatives.len()]
            } else {
                positives[op_index % positives.len()]
            };
            let _ = black_box(access.contains(key));
        } else if r < insert_cut {
            let key = positives[insert_cursor % positives.len()];
            insert_cursor += 1;
            access.write(key, false, &mut tally);
        } else {
            let key = positives[delete_cursor % positives.len()];
            delete_cursor += 1;
            access.write(key, true, &mut tally);
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::BlockedBloomFilter;
    use crate::cuckoo::CuckooFilter;
    use crate::error::ErrorKind;
    use crate::workload::WorkloadType;
    use crate::workload::make_disjoint_keys;

    fn run(
        threads: usize,
        total_ops: usize,
        wt: WorkloadType,
        write_sync: WriteSync,
    ) -> ThreadedRun {
        ThreadedRun {
            threads,
            total_ops,
            mix: wt.mix(),
            negative_share: 0.5,
            write_sync,
        }
    }

    #[test]
    fn test_all_ops_accounted() {
        let (pos, neg) = make_disjoint_keys(1_000, 2);
        let mut filter = BlockedBloomFilter::builder()
            .with_accuracy(1_000, 0.01)
            .build()
            .unwrap();
        for threads in [1, 3, 8] {
            let result = run_threaded(
                &mut filter,
                &run(threads, 10_001, WorkloadType::ReadOnly, WriteSync::None),
                &pos,
                &neg,
            )
            .unwrap();
            assert_eq!(result.ops, 10_001);
            assert_eq!(result.threads, threads);
            assert!(result.ops_per_sec > 0.0);
        }
    }

    #[test]
    fn test_coarse_writes_reach_filter() {
        let (pos, neg) = make_disjoint_keys(2_000, 5);
        let mut filter = CuckooFilter::builder()
            .with_accuracy(2_000, 0.01)
            .build()
            .unwrap();
        let result = run_threaded(
            &mut filter,
            &run(4, 8_000, WorkloadType::Balanced, WriteSync::Coarse),
            &pos,
            &neg,
        )
        .unwrap();
        assert_eq!(result.ops, 8_000);
        // about half of the operations are inserts
        assert!((3_500..4_500).contains(&filter.insert_calls()));
        assert_eq!(result.failed_inserts, filter.failures());
        assert_eq!(result.unsupported_ops, 0);
    }

    #[test]
    fn test_unsynchronised_writes_become_queries() {
        let (pos, neg) = make_disjoint_keys(500, 5);
        let mut filter = CuckooFilter::builder()
            .with_accuracy(500, 0.01)
            .build()
            .unwrap();
        run_threaded(
            &mut filter,
            &run(2, 1_000, WorkloadType::Balanced, WriteSync::None),
            &pos,
            &neg,
        )
        .unwrap();
        assert_eq!(filter.insert_calls(), 0);
    }

    #[test]
    fn test_zero_threads() {
        let mut filter = CuckooFilter::builder()
            .with_accuracy(10, 0.01)
            .build()
            .unwrap();
        let err = run_threaded(
            &mut filter,
            &run(0, 10, WorkloadType::ReadOnly, WriteSync::None),
            &[1],
            &[2],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
