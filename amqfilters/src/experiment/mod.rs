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

//! Experiment drivers.
//!
//! Each driver builds key sets and filters for a grid of configurations,
//! measures them through [`crate::harness`], aggregates over
//! [`ExperimentConfig::trials`] trials and returns one serialisable record per
//! configuration. Drivers never print; the caller decides how records are
//! written.
//!
//! ```rust
//! use amqfilters::experiment::ExperimentConfig;
//! use amqfilters::experiment::run_sanity;
//!
//! let config = ExperimentConfig::quick();
//! let records = run_sanity(&config).unwrap();
//! assert_eq!(records.len(), 4);
//! assert!(records.iter().all(|r| r.misses == 0));
//! ```

mod dynamic;
mod sanity;
mod simple;
mod space;
mod threaded;

use tracing::warn;

pub use self::dynamic::DynamicRecord;
pub use self::dynamic::Phase;
pub use self::dynamic::run_dynamic;
pub use self::sanity::SanityRecord;
pub use self::sanity::run_sanity;
pub use self::simple::SimpleRecord;
pub use self::simple::run_simple;
pub use self::space::SpaceRecord;
pub use self::space::run_space;
pub use self::threaded::ThreadedRecord;
pub use self::threaded::run_threaded_scaling;

use crate::bloom::BlockedBloomFilter;
use crate::cuckoo::CuckooFilter;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::filter::AnyFilter;
use crate::filter::Filter;
use crate::filter::FilterKind;
use crate::filter::Key;
use crate::quotient::QuotientFilter;
use crate::xor::XorFilter;

/// Sizes, grids and trial count shared by all drivers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    /// Repetitions per configuration; means and standard deviations are over these.
    pub trials: usize,
    /// Construction attempts allowed for XOR filters.
    pub xor_max_attempts: u32,

    pub sanity_n: usize,
    pub sanity_fpr: f64,

    pub simple_n: usize,
    pub simple_fprs: Vec<f64>,
    pub simple_ops: usize,
    pub negative_shares: Vec<f64>,

    pub dynamic_n: usize,
    pub dynamic_fpr: f64,
    /// Size of the key pool the dynamic sweep inserts from.
    pub dynamic_keys: usize,
    /// Fractions of filter capacity to fill.
    pub load_factors: Vec<f64>,

    pub threaded_n: usize,
    pub threaded_fprs: Vec<f64>,
    pub threaded_ops: usize,
    pub thread_counts: Vec<usize>,
    pub threaded_negative_share: f64,

    pub space_ns: Vec<usize>,
    pub space_fprs: Vec<f64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::paper()
    }
}

impl ExperimentConfig {
    /// Full-size experiment grid.
    pub fn paper() -> Self {
        ExperimentConfig {
            trials: 5,
            xor_max_attempts: 10,
            sanity_n: 10_000,
            sanity_fpr: 0.01,
            simple_n: 1_000_000,
            simple_fprs: vec![0.01],
            simple_ops: 2_000_000,
            negative_shares: vec![0.0, 0.5, 0.9],
            dynamic_n: 1_000_000,
            dynamic_fpr: 0.01,
            dynamic_keys: 5_000_000,
            load_factors: (0..12).map(|i| f64::from(40 + 5 * i) / 100.0).collect(),
            threaded_n: 1_000_000,
            threaded_fprs: vec![0.01],
            threaded_ops: 2_000_000,
            thread_counts: vec![1, 2, 4, 8],
            threaded_negative_share: 0.5,
            space_ns: vec![1_000_000, 5_000_000, 10_000_000],
            space_fprs: vec![0.05, 0.01, 0.001],
        }
    }

    /// Reduced grid that finishes in seconds, for smoke runs and tests.
    pub fn quick() -> Self {
        ExperimentConfig {
            trials: 2,
            simple_n: 20_000,
            simple_ops: 40_000,
            dynamic_n: 20_000,
            dynamic_keys: 100_000,
            load_factors: vec![0.5, 0.8, 0.95],
            threaded_n: 20_000,
            threaded_ops: 40_000,
            thread_counts: vec![1, 2],
            space_ns: vec![10_000, 50_000],
            ..Self::paper()
        }
    }

    /// Sets the number of trials.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Checks every size, rate and share.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ConfigInvalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        check(
            self.trials > 0,
            "trials must be at least 1",
            "trials",
            self.trials,
        )?;
        check(
            self.xor_max_attempts > 0,
            "xor_max_attempts must be at least 1",
            "xor_max_attempts",
            self.xor_max_attempts,
        )?;
        for (field, n) in [
            ("sanity_n", self.sanity_n),
            ("simple_n", self.simple_n),
            ("dynamic_n", self.dynamic_n),
            ("dynamic_keys", self.dynamic_keys),
            ("threaded_n", self.threaded_n),
        ] {
            check(n > 0, "sizes must be positive", field, n)?;
        }
        for &n in &self.space_ns {
            check(n > 0, "sizes must be positive", "space_ns", n)?;
        }

        let rates = [self.sanity_fpr, self.dynamic_fpr]
            .into_iter()
            .chain(self.simple_fprs.iter().copied())
            .chain(self.threaded_fprs.iter().copied())
            .chain(self.space_fprs.iter().copied());
        for p in rates {
            check(
                p > 0.0 && p < 1.0,
                "target rates must be in (0, 1)",
                "target_fpr",
                p,
            )?;
        }

        let shares = self
            .negative_shares
            .iter()
            .copied()
            .chain([self.threaded_negative_share]);
        for share in shares {
            check(
                (0.0..=1.0).contains(&share),
                "negative shares must be in [0, 1]",
                "negative_share",
                share,
            )?;
        }
        for &lf in &self.load_factors {
            check(
                lf > 0.0 && lf <= 1.0,
                "load factors must be in (0, 1]",
                "load_factor",
                lf,
            )?;
        }
        for &threads in &self.thread_counts {
            check(
                threads > 0,
                "thread counts must be positive",
                "threads",
                threads,
            )?;
        }
        Ok(())
    }
}

fn check(
    ok: bool,
    message: &'static str,
    field: &'static str,
    value: impl ToString,
) -> Result<(), Error> {
    if ok {
        Ok(())
    } else {
        Err(Error::config_invalid(message).with_context(field, value))
    }
}

/// Records of every sweep, as produced by [`run_full`].
#[derive(Debug, Clone, Default)]
pub struct FullReport {
    pub simple: Vec<SimpleRecord>,
    pub dynamic: Vec<DynamicRecord>,
    pub threaded: Vec<ThreadedRecord>,
    pub space: Vec<SpaceRecord>,
}

/// Runs the lookup, dynamic, thread-scaling and space sweeps in that order.
pub fn run_full(config: &ExperimentConfig) -> Result<FullReport, Error> {
    Ok(FullReport {
        simple: run_simple(config)?,
        dynamic: run_dynamic(config)?,
        threaded: run_threaded_scaling(config)?,
        space: run_space(config)?,
    })
}

/// Builds one filter of `kind` sized for `n` entries at `target_fpr` and loads `positives`.
///
/// Returns `Ok(None)` when an XOR filter cannot be built; the failure is logged.
/// Inserts rejected by a full cuckoo or quotient filter are logged and counted, not fatal.
fn build_loaded(
    kind: FilterKind,
    n: usize,
    target_fpr: f64,
    positives: &[Key],
    config: &ExperimentConfig,
) -> Result<Option<AnyFilter>, Error> {
    let mut filter: AnyFilter = match kind {
        FilterKind::BlockedBloom => BlockedBloomFilter::builder()
            .with_accuracy(n as u64, target_fpr)
            .build()?
            .into(),
        FilterKind::Cuckoo => CuckooFilter::builder()
            .with_accuracy(n as u64, target_fpr)
            .build()?
            .into(),
        FilterKind::Quotient => QuotientFilter::builder()
            .with_accuracy(n as u64, target_fpr)
            .build()?
            .into(),
        FilterKind::Xor => {
            let built = XorFilter::builder()
                .target_fpr(target_fpr)
                .max_attempts(config.xor_max_attempts)
                .build(positives);
            return match built {
                Ok(filter) => Ok(Some(filter.into())),
                Err(err) if err.kind() == ErrorKind::BuildFailed => {
                    warn!(n, target_fpr, "skipping xor filter: {err}");
                    Ok(None)
                }
                Err(err) => Err(err),
            };
        }
    };

    let failed = positives
        .iter()
        .filter(|&&key| filter.insert(key).is_err())
        .count();
    if failed > 0 {
        warn!(filter = %kind, n, failed, "inserts rejected while loading filter");
    }
    Ok(Some(filter))
}

/// Builds and loads every filter kind, skipping XOR filters that fail to build.
fn build_all_loaded(
    n: usize,
    target_fpr: f64,
    positives: &[Key],
    config: &ExperimentConfig,
) -> Result<Vec<AnyFilter>, Error> {
    let mut filters = Vec::with_capacity(FilterKind::ALL.len());
    for kind in FilterKind::ALL {
        if let Some(filter) = build_loaded(kind, n, target_fpr, positives, config)? {
            filters.push(filter);
        }
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        ExperimentConfig::paper().validate().unwrap();
        ExperimentConfig::quick().validate().unwrap();
        assert_eq!(ExperimentConfig::paper().load_factors.len(), 12);
        assert_eq!(ExperimentConfig::paper().load_factors[11], 0.95);
    }

    #[test]
    fn test_validate_rejects() {
        let err = ExperimentConfig::quick()
            .with_trials(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(err.context("trials"), Some("0"));

        let mut config = ExperimentConfig::quick();
        config.thread_counts.push(0);
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::quick();
        config.space_fprs = vec![1.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_all_loaded() {
        let config = ExperimentConfig::quick();
        let keys: Vec<Key> = (0..1_000).collect();
        let filters = build_all_loaded(1_000, 0.01, &keys, &config).unwrap();
        assert_eq!(filters.len(), 4);
        for filter in &filters {
            assert!(
                keys.iter().all(|&k| filter.contains(k)),
                "{}",
                filter.kind()
            );
        }
    }
}
