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
use crate::error::OpError;
use crate::filter::Filter;
use crate::filter::FilterKind;
use crate::filter::Key;
use crate::hash::MAX_FINGERPRINT_BITS;
use crate::hash::MIN_FINGERPRINT_BITS;
use crate::hash::check_accuracy;
use crate::hash::derive_fingerprint_bits;
use crate::hash::fingerprint;
use crate::hash::mix;

const DEFAULT_REMAINDER_BITS_HINT: u32 = 8;
const DEFAULT_SEED: u64 = 5;
const TARGET_LOAD_FACTOR: f64 = 0.8;

/// State of one table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum SlotState {
    Empty,
    Occupied,
    /// Previously occupied; scans continue past it, inserts may reuse it.
    Tombstone,
}

/// Lengths of maximal runs of occupied slots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClusterStats {
    /// Mean run length, 0 when the table holds nothing.
    pub avg_len: f64,
    /// Longest run.
    pub max_len: usize,
    /// Number of runs.
    pub clusters: usize,
}

/// A quotient filter with open addressing.
///
/// A key's hash is split into a quotient, which selects the home slot, and
/// a remainder of `r` bits, which is stored. Collisions scan forward from
/// the home slot with wrap-around. Erase leaves a tombstone so that scans
/// passing through the slot stay intact.
#[derive(Debug, Clone)]
pub struct QuotientFilter {
    seed: u64,
    remainder_bits: u32,
    quotient_bits: u32,
    remainders: Vec<u16>,
    states: Vec<SlotState>,
    occupied: usize,
    tombstones: usize,
    insert_calls: u64,
    insert_steps: u64,
}

impl QuotientFilter {
    /// Returns a builder for creating a quotient filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilters::quotient::QuotientFilter;
    ///
    /// let filter = QuotientFilter::builder()
    ///     .with_accuracy(1000, 0.01)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(filter.capacity(), 2048);
    /// assert_eq!(filter.remainder_bits(), 8);
    /// ```
    pub fn builder() -> QuotientFilterBuilder {
        QuotientFilterBuilder::default()
    }

    /// Adds a key.
    ///
    /// Claims the first empty or tombstoned slot on the scan path. Finding
    /// an occupied slot with the same remainder first is a successful no-op.
    ///
    /// # Errors
    ///
    /// [`OpError::CapacityExhausted`] after scanning the whole table without success.
    pub fn insert(&mut self, key: Key) -> Result<(), OpError> {
        self.insert_calls += 1;
        let (home, rem) = self.locate(key);
        let mask = self.capacity() - 1;

        for step in 0..self.capacity() {
            let slot = (home + step) & mask;
            self.insert_steps += 1;
            match self.states[slot] {
                SlotState::Empty | SlotState::Tombstone => {
                    if self.states[slot] == SlotState::Tombstone {
                        self.tombstones -= 1;
                    }
                    self.states[slot] = SlotState::Occupied;
                    self.remainders[slot] = rem;
                    self.occupied += 1;
                    return Ok(());
                }
                SlotState::Occupied if self.remainders[slot] == rem => return Ok(()),
                SlotState::Occupied => {}
            }
        }
        Err(OpError::CapacityExhausted)
    }

    /// Returns `true` if the key's remainder is found before the first empty slot.
    pub fn contains(&self, key: Key) -> bool {
        self.find(key).is_some()
    }

    /// Replaces the first matching slot with a tombstone, returning whether one was found.
    pub fn erase(&mut self, key: Key) -> Result<bool, OpError> {
        match self.find(key) {
            Some(slot) => {
                self.states[slot] = SlotState::Tombstone;
                self.occupied -= 1;
                self.tombstones += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Memory held by the remainder and state arrays, in bytes.
    pub fn bytes_used(&self) -> usize {
        self.remainders.len() * size_of::<u16>() + self.states.len() * size_of::<SlotState>()
    }

    /// Home slot of `key`.
    pub fn home_slot(&self, key: Key) -> usize {
        self.locate(key).0
    }

    /// Remainder width in bits.
    pub fn remainder_bits(&self) -> u32 {
        self.remainder_bits
    }

    /// log2 of the table size.
    pub fn quotient_bits(&self) -> u32 {
        self.quotient_bits
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.states.len()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Number of tombstoned slots.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Occupied slots / capacity.
    pub fn load_factor(&self) -> f64 {
        self.occupied as f64 / self.capacity() as f64
    }

    /// Mean number of slots examined per insert call.
    pub fn avg_scan_len_insert(&self) -> f64 {
        if self.insert_calls == 0 {
            0.0
        } else {
            self.insert_steps as f64 / self.insert_calls as f64
        }
    }

    /// Scans the table for maximal runs of occupied slots.
    ///
    /// Runs wrap around the end of the table. Tombstones break runs.
    pub fn cluster_stats(&self) -> ClusterStats {
        let n = self.capacity();
        let Some(start) = self.states.iter().position(|&s| s != SlotState::Occupied) else {
            return ClusterStats {
                avg_len: n as f64,
                max_len: n,
                clusters: 1,
            };
        };

        let mut clusters = 0usize;
        let mut total = 0usize;
        let mut max_len = 0usize;
        let mut run = 0usize;
        // Starting on a free slot means no run straddles the scan boundary.
        for step in 1..=n {
            if self.states[(start + step) % n] == SlotState::Occupied {
                run += 1;
            } else if run > 0 {
                clusters += 1;
                total += run;
                max_len = max_len.max(run);
                run = 0;
            }
        }
        debug_assert_eq!(run, 0);

        ClusterStats {
            avg_len: if clusters == 0 {
                0.0
            } else {
                total as f64 / clusters as f64
            },
            max_len,
            clusters,
        }
    }

    #[inline]
    fn locate(&self, key: Key) -> (usize, u16) {
        let h = mix(key, self.seed);
        let rem = fingerprint(h, self.remainder_bits);
        let home = ((h >> self.remainder_bits) as usize) & (self.capacity() - 1);
        (home, rem)
    }

    fn find(&self, key: Key) -> Option<usize> {
        let (home, rem) = self.locate(key);
        let mask = self.capacity() - 1;
        for step in 0..self.capacity() {
            let slot = (home + step) & mask;
            match self.states[slot] {
                SlotState::Empty => return None,
                SlotState::Occupied if self.remainders[slot] == rem => return Some(slot),
                _ => {}
            }
        }
        None
    }
}

impl Filter for QuotientFilter {
    fn insert(&mut self, key: Key) -> Result<(), OpError> {
        QuotientFilter::insert(self, key)
    }

    fn contains(&self, key: Key) -> bool {
        QuotientFilter::contains(self, key)
    }

    fn erase(&mut self, key: Key) -> Result<bool, OpError> {
        QuotientFilter::erase(self, key)
    }

    fn bytes_used(&self) -> usize {
        QuotientFilter::bytes_used(self)
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Quotient
    }
}

/// Builder for creating [`QuotientFilter`] instances.
#[derive(Debug, Clone)]
pub struct QuotientFilterBuilder {
    accuracy: Option<(u64, f64)>,
    remainder_bits_hint: u32,
    seed: u64,
}

impl Default for QuotientFilterBuilder {
    fn default() -> Self {
        QuotientFilterBuilder {
            accuracy: None,
            remainder_bits_hint: DEFAULT_REMAINDER_BITS_HINT,
            seed: DEFAULT_SEED,
        }
    }
}

impl QuotientFilterBuilder {
    /// Sizes the table for `max_items` entries at false positive rate `fpp`.
    pub fn with_accuracy(mut self, max_items: u64, fpp: f64) -> Self {
        self.accuracy = Some((max_items, fpp));
        self
    }

    /// Sets the minimum remainder width (default 8). Must be in `[4, 16]`.
    pub fn remainder_bits_hint(mut self, bits: u32) -> Self {
        self.remainder_bits_hint = bits;
        self
    }

    /// Sets the hash seed (default 5).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the filter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if no
    /// accuracy was given, `max_items` is 0, `fpp` is outside `(0, 1)`, or the remainder
    /// hint is outside `[4, 16]`.
    pub fn build(self) -> Result<QuotientFilter, Error> {
        let Some((max_items, fpp)) = self.accuracy else {
            return Err(Error::config_invalid("must call with_accuracy() before build()"));
        };
        check_accuracy(max_items, fpp)?;
        let hint = self.remainder_bits_hint;
        if !(MIN_FINGERPRINT_BITS..=MAX_FINGERPRINT_BITS).contains(&hint) {
            return Err(
                Error::config_invalid("remainder_bits_hint must be in [4, 16]")
                    .with_context("remainder_bits_hint", hint),
            );
        }

        let remainder_bits = derive_fingerprint_bits(hint, fpp, 1.0);
        let wanted = (max_items as f64 / TARGET_LOAD_FACTOR).ceil() as usize;
        let table_size = wanted.max(1).next_power_of_two();
        let quotient_bits = table_size.trailing_zeros();
        debug!(table_size, remainder_bits, "built quotient filter");

        Ok(QuotientFilter {
            seed: self.seed,
            remainder_bits,
            quotient_bits,
            remainders: vec![0; table_size],
            states: vec![SlotState::Empty; table_size],
            occupied: 0,
            tombstones: 0,
            insert_calls: 0,
            insert_steps: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn filter(n: u64) -> QuotientFilter {
        QuotientFilter::builder()
            .with_accuracy(n, 0.01)
            .build()
            .unwrap()
    }

    #[test]
    fn test_sizing() {
        let f = filter(1000);
        // 1000 / 0.8 = 1250 -> 2048
        assert_eq!(f.capacity(), 2048);
        assert_eq!(f.quotient_bits(), 11);
        assert_eq!(f.bytes_used(), 2048 * 3);

        let f = QuotientFilter::builder()
            .with_accuracy(8, 0.001)
            .build()
            .unwrap();
        assert_eq!(f.capacity(), 16);
        assert_eq!(f.remainder_bits(), 10);
    }

    #[test]
    fn test_full_table() {
        let mut f = filter(1);
        assert_eq!(f.capacity(), 2);
        let mut ok = 0;
        let mut failed = 0;
        for key in 0..50u64 {
            match f.insert(key) {
                Ok(()) => ok += 1,
                Err(e) => {
                    assert_eq!(e, OpError::CapacityExhausted);
                    failed += 1;
                }
            }
        }
        assert_eq!(f.occupied(), 2);
        assert!(ok >= 2);
        assert!(failed > 0);
        assert_eq!(f.cluster_stats().clusters, 1);
        assert_eq!(f.cluster_stats().max_len, 2);
        // lookups terminate on a table with no empty slot
        assert!(f.contains(0));
    }

    #[test]
    fn test_erase_leaves_tombstone() {
        let mut f = filter(100);
        f.insert(1).unwrap();
        assert_eq!(f.erase(1), Ok(true));
        assert_eq!(f.tombstones(), 1);
        assert_eq!(f.occupied(), 0);
        assert!(!f.contains(1));
        assert_eq!(f.erase(1), Ok(false));

        // reinsert reuses the tombstone
        f.insert(1).unwrap();
        assert_eq!(f.tombstones(), 0);
        assert!(f.contains(1));
    }

    #[test]
    fn test_reinsert_is_idempotent() {
        let mut f = filter(100);
        f.insert(9).unwrap();
        f.insert(9).unwrap();
        assert_eq!(f.occupied(), 1);
    }

    #[test]
    fn test_cluster_stats() {
        let mut f = filter(10_000);
        assert_eq!(f.cluster_stats(), ClusterStats::default());
        for key in 0..10_000u64 {
            f.insert(key).unwrap();
        }
        let stats = f.cluster_stats();
        assert!(stats.clusters > 0);
        assert!(stats.max_len as f64 >= stats.avg_len);
        assert!(stats.avg_len >= 1.0);
        assert!(f.avg_scan_len_insert() >= 1.0);
        assert!(f.load_factor() <= 10_000.0 / 16_384.0);
    }

    #[test]
    fn test_invalid_hint() {
        let err = QuotientFilter::builder()
            .with_accuracy(10, 0.01)
            .remainder_bits_hint(2)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
