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
use crate::harness::RunOptions;
use crate::harness::Summary;
use crate::harness::bits_per_entry;
use crate::harness::measure_false_positive_rate;
use crate::harness::run_workload;
use crate::workload::WorkloadGenerator;
use crate::workload::WorkloadType;
use crate::workload::make_disjoint_keys;

const KEY_SEED: u64 = 123;
const WORKLOAD_SEED: u64 = 1;

/// One row of the lookup sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleRecord {
    pub filter: &'static str,
    pub n: usize,
    pub target_fpr: f64,
    pub achieved_fpr: f64,
    pub bpe: f64,
    pub workload: &'static str,
    pub neg_share: f64,
    pub ops: usize,
    pub ops_per_sec_mean: f64,
    pub ops_per_sec_std: f64,
    pub p50_ns_mean: f64,
    pub p50_ns_std: f64,
    pub p95_ns_mean: f64,
    pub p95_ns_std: f64,
    pub p99_ns_mean: f64,
    pub p99_ns_std: f64,
}

/// Lookup throughput and tail latency of loaded filters, per negative-query share.
pub fn run_simple(config: &ExperimentConfig) -> Result<Vec<SimpleRecord>, Error> {
    config.validate()?;
    let n = config.simple_n;
    let (positives, negatives) = make_disjoint_keys(n, KEY_SEED);
    let workload = WorkloadType::ReadOnly;

    let mut records = Vec::new();
    for &target_fpr in &config.simple_fprs {
        for mut filter in build_all_loaded(n, target_fpr, &positives, config)? {
            let achieved_fpr = measure_false_positive_rate(&filter, &negatives);
            let bpe = bits_per_entry(&filter, n);
            let options = RunOptions::for_filter(&filter);

            for &neg_share in &config.negative_shares {
                let ops = WorkloadGenerator::new(workload.mix(), neg_share, WORKLOAD_SEED)?
                    .generate(config.simple_ops, &positives, &negatives)?;

                let mut throughput = Vec::with_capacity(config.trials);
                let mut p50 = Vec::with_capacity(config.trials);
                let mut p95 = Vec::with_capacity(config.trials);
                let mut p99 = Vec::with_capacity(config.trials);
                for _ in 0..config.trials {
                    let result = run_workload(&mut filter, &ops, options);
                    throughput.push(result.ops_per_sec);
                    p50.push(result.p50_ns);
                    p95.push(result.p95_ns);
                    p99.push(result.p99_ns);
                }

                let throughput = Summary::of(&throughput);
                let (p50, p95, p99) = (Summary::of(&p50), Summary::of(&p95), Summary::of(&p99));
                info!(
                    filter = %filter.kind(),
                    target_fpr,
                    neg_share,
                    ops_per_sec = throughput.mean,
                    "lookup sweep configuration done"
                );
                records.push(SimpleRecord {
                    filter: filter.kind().name(),
                    n,
                    target_fpr,
                    achieved_fpr,
                    bpe,
                    workload: workload.name(),
                    neg_share,
                    ops: ops.len(),
                    ops_per_sec_mean: throughput.mean,
                    ops_per_sec_std: throughput.stddev,
                    p50_ns_mean: p50.mean,
                    p50_ns_std: p50.stddev,
                    p95_ns_mean: p95.mean,
                    p95_ns_std: p95.stddev,
                    p99_ns_mean: p99.mean,
                    p99_ns_std: p99.stddev,
                });
            }
        }
    }
    Ok(records)
}
