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
use crate::experiment::build_loaded;
use crate::filter::Filter;
use crate::filter::FilterKind;
use crate::harness::bits_per_entry;
use crate::harness::measure_false_positive_rate;
use crate::workload::make_disjoint_keys;

const SANITY_SEED: u64 = 42;

/// One row of the sanity check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanityRecord {
    pub filter: &'static str,
    pub n: usize,
    pub target_fpr: f64,
    /// Inserted keys the filter reports absent. Always 0 for a correct filter.
    pub misses: usize,
    pub achieved_fpr: f64,
    pub bpe: f64,
    /// False when an XOR filter could not be built; the other measurements are then 0.
    pub built: bool,
}

/// Loads each filter with `sanity_n` keys and checks for false negatives.
pub fn run_sanity(config: &ExperimentConfig) -> Result<Vec<SanityRecord>, Error> {
    config.validate()?;
    let n = config.sanity_n;
    let target_fpr = config.sanity_fpr;
    let (positives, negatives) = make_disjoint_keys(n, SANITY_SEED);

    let mut records = Vec::with_capacity(FilterKind::ALL.len());
    for kind in FilterKind::ALL {
        let record = match build_loaded(kind, n, target_fpr, &positives, config)? {
            Some(filter) => SanityRecord {
                filter: kind.name(),
                n,
                target_fpr,
                misses: positives.iter().filter(|&&k| !filter.contains(k)).count(),
                achieved_fpr: measure_false_positive_rate(&filter, &negatives),
                bpe: bits_per_entry(&filter, n),
                built: true,
            },
            None => SanityRecord {
                filter: kind.name(),
                n,
                target_fpr,
                misses: 0,
                achieved_fpr: 0.0,
                bpe: 0.0,
                built: false,
            },
        };
        info!(
            filter = record.filter,
            misses = record.misses,
            fpr = record.achieved_fpr,
            bpe = record.bpe,
            "sanity check done"
        );
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanity_quick() {
        let records = run_sanity(&ExperimentConfig::quick()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.filter).collect();
        assert_eq!(names, ["bloom_blocked", "cuckoo", "quotient", "xor"]);
        for record in &records {
            assert!(record.built);
            assert_eq!(record.misses, 0, "{}", record.filter);
            assert!(record.achieved_fpr < 0.03, "{}", record.filter);
            assert!(record.bpe > 0.0);
        }
    }
}
