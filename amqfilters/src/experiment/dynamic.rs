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

use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::cuckoo::CuckooFilter;
use crate::error::Error;
use crate::experiment::ExperimentConfig;
use crate::filter::Filter;
use crate::filter::Key;
use crate::harness::Summary;
use crate::harness::mean;
use crate::quotient::QuotientFilter;
use crate::workload::make_keys;

const KEY_SEED: u64 = 999;

/// Which half of a dynamic trial a record measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Insert,
    Delete,
}

/// One row of the dynamic load-factor sweep.
///
/// Cuckoo-only columns are 0 for quotient rows and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicRecord {
    pub filter: &'static str,
    pub n: usize,
    pub target_fpr: f64,
    pub load_factor: f64,
    pub phase: Phase,
    pub ops: usize,
    pub ops_per_sec_mean: f64,
    pub ops_per_sec_std: f64,
    pub failure_rate: f64,
    pub avg_kicks_per_insert: f64,
    pub stash_inserts: f64,
    pub avg_scan_len_insert: f64,
    pub avg_cluster_len: f64,
    pub max_cluster_len: usize,
}

/// Structural measurements taken after the insert phase.
#[derive(Debug, Clone, Copy, Default)]
struct Diagnostics {
    failure_rate: f64,
    avg_kicks_per_insert: f64,
    stash_inserts: f64,
    avg_scan_len_insert: f64,
    avg_cluster_len: f64,
    max_cluster_len: f64,
}

impl Diagnostics {
    fn cuckoo(filter: &CuckooFilter) -> Self {
        Diagnostics {
            failure_rate: filter.failure_rate(),
            avg_kicks_per_insert: filter.avg_kicks_per_insert(),
            stash_inserts: filter.stash_inserts() as f64,
            ..Diagnostics::default()
        }
    }

    fn quotient(filter: &QuotientFilter) -> Self {
        let clusters = filter.cluster_stats();
        Diagnostics {
            avg_scan_len_insert: filter.avg_scan_len_insert(),
            avg_cluster_len: clusters.avg_len,
            max_cluster_len: clusters.max_len as f64,
            ..Diagnostics::default()
        }
    }

    fn average(all: &[Diagnostics]) -> Self {
        let field = |f: fn(&Diagnostics) -> f64| mean(&all.iter().map(f).collect::<Vec<_>>());
        Diagnostics {
            failure_rate: field(|d| d.failure_rate),
            avg_kicks_per_insert: field(|d| d.avg_kicks_per_insert),
            stash_inserts: field(|d| d.stash_inserts),
            avg_scan_len_insert: field(|d| d.avg_scan_len_insert),
            avg_cluster_len: field(|d| d.avg_cluster_len),
            max_cluster_len: field(|d| d.max_cluster_len),
        }
    }
}

/// Fills fresh cuckoo and quotient filters to each load factor, then empties them,
/// timing both phases.
pub fn run_dynamic(config: &ExperimentConfig) -> Result<Vec<DynamicRecord>, Error> {
    config.validate()?;
    let keys = make_keys(config.dynamic_keys, KEY_SEED);
    let n = config.dynamic_n as u64;
    let fpr = config.dynamic_fpr;

    let mut records = Vec::new();
    sweep(
        config,
        &keys,
        || CuckooFilter::builder().with_accuracy(n, fpr).build(),
        CuckooFilter::capacity,
        Diagnostics::cuckoo,
        &mut records,
    )?;
    sweep(
        config,
        &keys,
        || QuotientFilter::builder().with_accuracy(n, fpr).build(),
        QuotientFilter::capacity,
        Diagnostics::quotient,
        &mut records,
    )?;
    Ok(records)
}

fn sweep<F: Filter>(
    config: &ExperimentConfig,
    keys: &[Key],
    build: impl Fn() -> Result<F, Error>,
    capacity: impl Fn(&F) -> usize,
    diagnose: impl Fn(&F) -> Diagnostics,
    records: &mut Vec<DynamicRecord>,
) -> Result<(), Error> {
    let capacity = capacity(&build()?);

    for &load_factor in &config.load_factors {
        let inserts = ((load_factor * capacity as f64).floor() as usize).min(keys.len());
        let keys = &keys[..inserts];

        let mut insert_rates = Vec::with_capacity(config.trials);
        let mut delete_rates = Vec::with_capacity(config.trials);
        let mut diagnostics = Vec::with_capacity(config.trials);
        let mut kind = None;
        for _ in 0..config.trials {
            let mut filter = build()?;
            kind = Some(filter.kind());

            insert_rates.push(timed_rate(keys, |key| {
                let _ = filter.insert(key);
            }));
            diagnostics.push(diagnose(&filter));
            delete_rates.push(timed_rate(keys, |key| {
                let _ = filter.erase(key);
            }));
        }
        let Some(kind) = kind else {
            continue;
        };

        let diag = Diagnostics::average(&diagnostics);
        for (phase, rates) in [(Phase::Insert, &insert_rates), (Phase::Delete, &delete_rates)] {
            let rate = Summary::of(rates);
            records.push(DynamicRecord {
                filter: kind.name(),
                n: config.dynamic_n,
                target_fpr: config.dynamic_fpr,
                load_factor,
                phase,
                ops: inserts,
                ops_per_sec_mean: rate.mean,
                ops_per_sec_std: rate.stddev,
                failure_rate: diag.failure_rate,
                avg_kicks_per_insert: diag.avg_kicks_per_insert,
                stash_inserts: diag.stash_inserts,
                avg_scan_len_insert: diag.avg_scan_len_insert,
                avg_cluster_len: diag.avg_cluster_len,
                max_cluster_len: diag.max_cluster_len as usize,
            });
        }
        info!(
            filter = %kind,
            load_factor,
            inserts,
            failure_rate = diag.failure_rate,
            "dynamic sweep configuration done"
        );
    }
    Ok(())
}

/// Applies `op` to every key and returns operations per second.
fn timed_rate(keys: &[Key], mut op: impl FnMut(Key)) -> f64 {
    let start = Instant::now();
    for &key in keys {
        op(key);
    }
    let seconds = start.elapsed().as_secs_f64();
    if seconds > 0.0 {
        keys.len() as f64 / seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_quick_shape() {
        let mut config = ExperimentConfig::quick().with_trials(1);
        config.dynamic_n = 2_000;
        config.dynamic_keys = 10_000;
        let records = run_dynamic(&config).unwrap();

        // 2 filters x 3 load factors x 2 phases
        assert_eq!(records.len(), 12);
        let cuckoo: Vec<_> = records.iter().filter(|r| r.filter == "cuckoo").collect();
        let quotient: Vec<_> = records.iter().filter(|r| r.filter == "quotient").collect();
        assert_eq!(cuckoo.len(), 6);
        assert_eq!(quotient.len(), 6);

        // capacity 1024 buckets x 4 slots; floor(0.5 * 4096)
        assert_eq!(cuckoo[0].ops, 2_048);
        assert_eq!(cuckoo[0].phase, Phase::Insert);
        assert_eq!(cuckoo[1].phase, Phase::Delete);
        assert!(cuckoo.iter().all(|r| r.avg_scan_len_insert == 0.0));
        assert!(quotient.iter().all(|r| r.avg_scan_len_insert >= 1.0));
        assert!(quotient.iter().all(|r| r.max_cluster_len >= 1));
    }
}
