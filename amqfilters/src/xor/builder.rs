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

use tracing::debug;

use crate::error::Error;
use crate::hash::MAX_FINGERPRINT_BITS;
use crate::hash::MIN_FINGERPRINT_BITS;
use crate::hash::derive_fingerprint_bits;
use crate::xor::filter::XorFilter;

const DEFAULT_TARGET_FPR: f64 = 0.01;
const DEFAULT_FINGERPRINT_BITS_HINT: u32 = 8;
const DEFAULT_SEED: u64 = 7;
const DEFAULT_LOAD_FACTOR: f64 = 1.23;
const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Builder for creating XOR filters.
///
/// XOR filters require distinct keys and are immutable after construction.
///
/// # Examples
///
/// ```
/// use amqfilters::xor::XorFilter;
///
/// let keys: Vec<u64> = (0..10_000).collect();
/// let filter = XorFilter::builder()
///     .target_fpr(0.001)
///     .seed(42)
///     .max_attempts(10)
///     .build(&keys)
///     .unwrap();
///
/// assert!(filter.contains(9999));
/// assert_eq!(filter.fingerprint_bits(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct XorFilterBuilder {
    target_fpr: f64,
    fingerprint_bits_hint: u32,
    seed: u64,
    load_factor: f64,
    max_attempts: u32,
}

impl Default for XorFilterBuilder {
    fn default() -> Self {
        Self {
            target_fpr: DEFAULT_TARGET_FPR,
            fingerprint_bits_hint: DEFAULT_FINGERPRINT_BITS_HINT,
            seed: DEFAULT_SEED,
            load_factor: DEFAULT_LOAD_FACTOR,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl XorFilterBuilder {
    /// Sets the target false positive rate (default 0.01).
    pub fn target_fpr(mut self, fpr: f64) -> Self {
        self.target_fpr = fpr;
        self
    }

    /// Sets the minimum fingerprint width (default 8). Must be in `[4, 16]`.
    pub fn fingerprint_bits_hint(mut self, bits: u32) -> Self {
        self.fingerprint_bits_hint = bits;
        self
    }

    /// Sets the hash seed used for the first construction attempt (default 7).
    ///
    /// Filters built with different seeds are incompatible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the ratio of table slots to keys (default 1.23).
    ///
    /// Values much below 1.23 make peeling fail.
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Sets the maximum number of construction attempts (default 1).
    ///
    /// Each retry derives a fresh seed; the table size never grows.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Builds an XOR filter from the provided keys.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if a
    ///   parameter is out of range.
    /// - [`ErrorKind::BuildFailed`](crate::error::ErrorKind::BuildFailed) if no attempt
    ///   peels the key set, which is certain when keys repeat.
    pub fn build(self, keys: &[u64]) -> Result<XorFilter, Error> {
        if !(self.target_fpr > 0.0 && self.target_fpr < 1.0) {
            return Err(
                Error::config_invalid("target_fpr must be between 0.0 and 1.0 (exclusive)")
                    .with_context("target_fpr", self.target_fpr),
            );
        }
        let hint = self.fingerprint_bits_hint;
        if !(MIN_FINGERPRINT_BITS..=MAX_FINGERPRINT_BITS).contains(&hint) {
            return Err(
                Error::config_invalid("fingerprint_bits_hint must be in [4, 16]")
                    .with_context("fingerprint_bits_hint", hint),
            );
        }
        if !(self.load_factor.is_finite() && self.load_factor > 0.0) {
            return Err(Error::config_invalid("load_factor must be positive")
                .with_context("load_factor", self.load_factor));
        }
        if self.max_attempts == 0 {
            return Err(Error::config_invalid("max_attempts must be at least 1"));
        }

        let fingerprint_bits = derive_fingerprint_bits(hint, self.target_fpr, 1.0);
        let filter = XorFilter::build_from_keys(
            keys,
            self.seed,
            fingerprint_bits,
            self.load_factor,
            self.max_attempts,
        )?;
        debug!(
            keys = keys.len(),
            slots = filter.len(),
            fingerprint_bits,
            seed = filter.seed(),
            "built xor filter"
        );
        Ok(filter)
    }
}
