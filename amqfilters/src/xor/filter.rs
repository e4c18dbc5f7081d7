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

use std::ops::Range;

use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::OpError;
use crate::filter::Filter;
use crate::filter::FilterKind;
use crate::filter::Key;
use crate::hash::GOLDEN_GAMMA;
use crate::hash::fingerprint;
use crate::hash::mix;
use crate::hash::splitmix64;
use crate::xor::XorFilterBuilder;

/// Smallest table; each segment holds at least 21 slots.
const MIN_TABLE_SIZE: usize = 64;
const FINGERPRINT_SEED_SALT: u64 = 0xdead_c0de;

/// A static XOR filter with `r`-bit fingerprints.
///
/// The table holds `next_power_of_two(ceil(load_factor * n))` slots, split
/// into three near-equal segments. Each key hashes to one position per
/// segment, and the filter is built so that the XOR of the three slots equals
/// the key's fingerprint. Xor filters cannot be modified after
/// construction; [`XorFilter::insert`] and [`XorFilter::erase`] always fail.
///
/// # Examples
///
/// ```
/// use amqfilters::xor::XorFilter;
///
/// let keys: Vec<u64> = (0..10_000).collect();
/// let filter = XorFilter::builder().build(&keys).unwrap();
///
/// assert!(filter.contains(42));
/// // ceil(1.23 * 10_000) = 12_300 rounds up to 16_384 slots
/// assert_eq!(filter.len(), 16_384);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct XorFilter {
    seed: u64,
    fingerprint_bits: u32,
    fingerprints: Vec<u16>,
}

impl XorFilter {
    /// Creates a builder for XOR filters.
    pub fn builder() -> XorFilterBuilder {
        XorFilterBuilder::default()
    }

    /// Returns `true` if the filter probably contains the specified key.
    ///
    /// There are no false negatives for keys the filter was built from.
    pub fn contains(&self, key: Key) -> bool {
        if self.fingerprints.is_empty() {
            return false;
        }
        let [h0, h1, h2] = positions(key, self.seed, self.fingerprints.len());
        let fp = self.fingerprint(key);
        fp == self.fingerprints[h0] ^ self.fingerprints[h1] ^ self.fingerprints[h2]
    }

    /// Always fails: XOR filters are immutable.
    pub fn insert(&mut self, _key: Key) -> Result<(), OpError> {
        Err(OpError::Unsupported)
    }

    /// Always fails: XOR filters are immutable.
    pub fn erase(&mut self, _key: Key) -> Result<bool, OpError> {
        Err(OpError::Unsupported)
    }

    /// Memory held by the fingerprint table, in bytes.
    pub fn bytes_used(&self) -> usize {
        self.fingerprints.len() * size_of::<u16>()
    }

    /// Returns the number of fingerprint slots.
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    /// Returns true if the filter was built from an empty key set.
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Returns the seed of the successful construction attempt.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the slot ranges of the three segments.
    pub fn segments(&self) -> [Range<usize>; 3] {
        segment_bounds(self.fingerprints.len())
    }

    /// Returns the fingerprint width in bits.
    pub fn fingerprint_bits(&self) -> u32 {
        self.fingerprint_bits
    }

    /// Returns the fingerprint table.
    pub fn fingerprints(&self) -> &[u16] {
        &self.fingerprints
    }

    pub(super) fn build_from_keys(
        keys: &[u64],
        seed: u64,
        fingerprint_bits: u32,
        load_factor: f64,
        max_attempts: u32,
    ) -> Result<Self, Error> {
        if keys.is_empty() {
            return Ok(Self {
                seed,
                fingerprint_bits,
                fingerprints: Vec::new(),
            });
        }
        if keys.len() > u32::MAX as usize {
            return Err(Error::config_invalid("too many keys for an xor filter")
                .with_context("keys", keys.len()));
        }

        let size = compute_table_size(keys.len(), load_factor);
        let mut rng_state = seed;
        let mut attempt_seed = seed;
        let mut peeled = 0;
        for attempt in 0..max_attempts {
            if attempt > 0 {
                attempt_seed = splitmix64(&mut rng_state);
            }

            let mut filter = Self {
                seed: attempt_seed,
                fingerprint_bits,
                fingerprints: Vec::new(),
            };
            match filter.try_build_fingerprints(keys, size) {
                Ok(fingerprints) => {
                    filter.fingerprints = fingerprints;
                    return Ok(filter);
                }
                Err(count) => peeled = count,
            }
        }

        Err(Error::new(
            ErrorKind::BuildFailed,
            "failed to construct xor filter; keys may contain duplicates or the table is too small",
        )
        .with_context("attempts", max_attempts)
        .with_context("keys", keys.len())
        .with_context("slots", size)
        .with_context("seed", seed)
        .set_source(anyhow::anyhow!("last attempt peeled {peeled} of {} keys", keys.len())))
    }

    #[inline]
    fn fingerprint(&self, key: Key) -> u16 {
        let hash = mix(key, self.seed ^ FINGERPRINT_SEED_SALT);
        fingerprint(hash, self.fingerprint_bits)
    }

    /// Peels the key hypergraph and assigns fingerprints in reverse peel order.
    ///
    /// Fails with the number of peeled keys if a 2-core remains.
    fn try_build_fingerprints(&self, keys: &[u64], size: usize) -> Result<Vec<u16>, usize> {
        let mut degree = vec![0u32; size];
        let mut edge_xor = vec![0u32; size];

        for (edge, &key) in keys.iter().enumerate() {
            for pos in positions(key, self.seed, size) {
                degree[pos] += 1;
                edge_xor[pos] ^= edge as u32;
            }
        }

        let mut queue: Vec<usize> = (0..size).filter(|&pos| degree[pos] == 1).collect();
        // (edge, position it was peeled from)
        let mut stack: Vec<(u32, usize)> = Vec::with_capacity(keys.len());
        while let Some(pos) = queue.pop() {
            if degree[pos] != 1 {
                continue;
            }
            let edge = edge_xor[pos];
            stack.push((edge, pos));
            for other in positions(keys[edge as usize], self.seed, size) {
                degree[other] -= 1;
                edge_xor[other] ^= edge;
                if degree[other] == 1 {
                    queue.push(other);
                }
            }
        }

        if stack.len() != keys.len() {
            return Err(stack.len());
        }

        let mut fingerprints = vec![0u16; size];
        for &(edge, pos) in stack.iter().rev() {
            let key = keys[edge as usize];
            let [h0, h1, h2] = positions(key, self.seed, size);
            debug_assert_eq!(fingerprints[pos], 0);
            fingerprints[pos] =
                self.fingerprint(key) ^ fingerprints[h0] ^ fingerprints[h1] ^ fingerprints[h2];
        }
        Ok(fingerprints)
    }
}

impl Filter for XorFilter {
    fn insert(&mut self, key: Key) -> Result<(), OpError> {
        XorFilter::insert(self, key)
    }

    fn contains(&self, key: Key) -> bool {
        XorFilter::contains(self, key)
    }

    fn erase(&mut self, key: Key) -> Result<bool, OpError> {
        XorFilter::erase(self, key)
    }

    fn bytes_used(&self) -> usize {
        XorFilter::bytes_used(self)
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Xor
    }
}

fn compute_table_size(num_keys: usize, load_factor: f64) -> usize {
    let slots = (num_keys as f64 * load_factor).ceil() as usize;
    slots.next_power_of_two().max(MIN_TABLE_SIZE)
}

/// Splits `size` slots into three contiguous, near-equal segments.
#[inline]
fn segment_bounds(size: usize) -> [Range<usize>; 3] {
    let first = size / 3;
    let second = 2 * size / 3;
    [0..first, first..second, second..size]
}

/// One position per segment, so the three are always distinct.
#[inline]
fn positions(key: u64, seed: u64, size: usize) -> [usize; 3] {
    let mut out = [0usize; 3];
    for (i, (slot, segment)) in out.iter_mut().zip(segment_bounds(size)).enumerate() {
        let lane_seed = seed.wrapping_add(GOLDEN_GAMMA.wrapping_mul(i as u64 + 1));
        let h = mix(key, lane_seed);
        *slot = segment.start + reduce((h >> 32) as u32, segment.len());
    }
    out
}

/// Maps `hash` uniformly onto `[0, n)` without a division.
#[inline]
fn reduce(hash: u32, n: usize) -> usize {
    ((hash as u64 * n as u64) >> 32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size() {
        // ceil(1.23 * n) rounded up to a power of two
        assert_eq!(compute_table_size(1_000, 1.23), 2_048);
        assert_eq!(compute_table_size(100_000, 1.23), 131_072);
        assert_eq!(compute_table_size(1_000_000, 1.23), 2_097_152);
        assert_eq!(compute_table_size(5_000_000, 1.23), 8_388_608);
        assert_eq!(compute_table_size(100, 1.23), 128);
        assert_eq!(compute_table_size(1, 1.23), MIN_TABLE_SIZE);
        assert_eq!(compute_table_size(40, 1.23), MIN_TABLE_SIZE);
    }

    #[test]
    fn test_tiny_key_set_builds() {
        let filter = XorFilter::builder().build(&[1, 2, 3]).unwrap();
        assert_eq!(filter.len(), MIN_TABLE_SIZE);
        assert!([1, 2, 3].iter().all(|&k| filter.contains(k)));
    }

    #[test]
    fn test_segment_bounds_cover_table() {
        let [a, b, c] = segment_bounds(2_048);
        assert_eq!((a.start, a.end), (0, 682));
        assert_eq!((b.start, b.end), (682, 1_365));
        assert_eq!((c.start, c.end), (1_365, 2_048));
        assert!(segment_bounds(MIN_TABLE_SIZE).iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn test_positions_distinct() {
        let [sa, sb, sc] = segment_bounds(2_048);
        for key in 0..1_000u64 {
            let [a, b, c] = positions(key, 7, 2_048);
            assert!(sa.contains(&a));
            assert!(sb.contains(&b));
            assert!(sc.contains(&c));
        }
    }

    #[test]
    fn test_reduce_bounds() {
        assert_eq!(reduce(0, 683), 0);
        assert_eq!(reduce(u32::MAX, 683), 682);
        assert_eq!(reduce(1 << 31, 682), 341);
    }

    #[test]
    fn test_all_keys_present() {
        let keys: Vec<u64> = (0..5_000).map(|i| i * 7 + 3).collect();
        let filter = XorFilter::builder().build(&keys).unwrap();
        assert_eq!(filter.len(), 8_192);
        for key in keys {
            assert!(filter.contains(key));
        }
    }

    #[test]
    fn test_duplicates_fail() {
        let keys = [1u64, 2, 3, 3];
        let err = XorFilter::builder()
            .max_attempts(5)
            .build(&keys)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BuildFailed);
        assert_eq!(err.context("attempts"), Some("5"));
        // the repeated key and its twin can never be peeled
        let source = std::error::Error::source(&err).unwrap().to_string();
        assert!(source.starts_with("last attempt peeled "), "{source}");
        assert!(source.ends_with(" of 4 keys"), "{source}");
    }

    #[test]
    fn test_empty_filter() {
        let mut filter = XorFilter::builder().build(&[]).unwrap();
        assert!(filter.is_empty());
        assert!(!filter.contains(0));
        assert_eq!(filter.insert(1), Err(OpError::Unsupported));
        assert_eq!(filter.erase(1), Err(OpError::Unsupported));
    }
}
