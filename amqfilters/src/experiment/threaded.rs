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

use serde::Serialize;
use tracing::info;

use crate::error::Error;
use crate::experiment::ExperimentConfig;
use crate::experiment::build_all_loaded;
use crate::filter::Filter;
use crate::harness::Summary;
use crate::harness::ThreadedRun;
use crate::harness::WriteSync;
use crate::harness::run_threaded;
use crate::workload::WorkloadType;
use crate::workload::make_disjoint_keys;

const KEY_SEED: u64 = 2025;
const WORKLOADS: [WorkloadType; 2] = [WorkloadType::ReadOnly, WorkloadType::ReadMostly];

/// One row of the thread-scaling sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadedRecord {
    pub filter: &'static str,
    pub n: usize,
    pub target_fpr: f64,
    pub workload: &'static str,
    pub neg_share: f64,
    pub threads: usize,
    pub ops: usize,
    pub ops_per_sec_mean: f64,
    pub ops_per_sec_std: f64,
}

/// Aggregate throughput of loaded filters as the worker count grows.
///
/// Filters are built once per target rate and reused across workloads,
/// thread counts and trials, so writes from earlier runs stay in the filter.
/// Writes go through a coarse lock for every filter that accepts inserts.
pub fn run_threaded_scaling(config: &ExperimentConfig) -> Result<Vec<ThreadedRecord>, Error> {
    config.validate()?;
    let n = config.threaded_n;
    let neg_share = config.threaded_negative_share;
    let (positives, negatives) = make_disjoint_keys(n, KEY_SEED);

    let mut records = Vec::new();
    for &target_fpr in &config.threaded_fprs {
        for mut filter in build_all_loaded(n, target_fpr, &positives, config)? {
            let kind = filter.kind();
            for workload in WORKLOADS {
                let mix = workload.mix();
                let write_sync = if kind.accepts_inserts() && mix.has_writes() {
                    WriteSync::Coarse
                } else {
                    WriteSync::None
                };

                for &threads in &config.thread_counts {
                    let run = ThreadedRun {
                        threads,
                        total_ops: config.threaded_ops,
                        mix,
                        negative_share: neg_share,
                        write_sync,
                    };
                    let mut rates = Vec::with_capacity(config.trials);
                    for _ in 0..config.trials {
                        let result = run_threaded(&mut filter, &run, &positives, &negatives)?;
                        rates.push(result.ops_per_sec);
                    }

                    let rate = Summary::of(&rates);
                    info!(
                        filter = %kind,
                        workload = workload.name(),
                        threads,
                        ops_per_sec = rate.mean,
                        "thread scaling configuration done"
                    );
                    records.push(ThreadedRecord {
                        filter: kind.name(),
                        n,
                        target_fpr,
                        workload: workload.name(),
                        neg_share,
                        threads,
                        ops: config.threaded_ops,
                        ops_per_sec_mean: rate.mean,
                        ops_per_sec_std: rate.stddev,
                    });
                }
            }
        }
    }
    Ok(records)
}
