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
use crate::hash::RandomSource;
use crate::hash::SplitMix64;
use crate::hash::check_accuracy;
use crate::hash::derive_fingerprint_bits;
use crate::hash::fingerprint;
use crate::hash::mix;

/// Default number of fingerprint slots per bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 4;
/// Default number of displacements tried before falling back to the stash.
pub const DEFAULT_MAX_KICKS: usize = 500;
/// Default stash capacity.
pub const DEFAULT_STASH_CAPACITY: usize = 64;

const DEFAULT_FINGERPRINT_BITS_HINT: u32 = 8;
const DEFAULT_SEED: u64 = 3;
const MAX_BUCKET_SIZE: usize = 64;
const TARGET_LOAD_FACTOR: f64 = 0.9;
const INDEX_SEED_SALT: u64 = 0x0012_3456_78ab_cdef;
const ALT_SEED_SALT: u64 = 0xf00d_f00d;
const EMPTY: u16 = 0;

/// A cuckoo filter with a bounded overflow stash.
///
/// Each key is reduced to a nonzero fingerprint that lives in one of two
/// candidate buckets. The buckets are related by
/// `alt = index ^ hash(fingerprint)`, so a stored fingerprint can always be
/// moved to its other bucket without knowing the original key.
///
/// The filter is not internally synchronised; callers that share it across
/// threads must lock around mutation.
#[derive(Debug, Clone)]
pub struct CuckooFilter {
    seed: u64,
    fingerprint_bits: u32,
    bucket_size: usize,
    num_buckets: usize,
    max_kicks: usize,
    stash_capacity: usize,
    /// Bucket `b` owns `slots[b * bucket_size..(b + 1) * bucket_size]`
    slots: Vec<u16>,
    stash: Vec<u16>,
    occupied: usize,
    rng: SplitMix64,
    /// Slots swapped during the current eviction chain, for rollback
    kick_path: Vec<usize>,
    insert_calls: u64,
    failures: u64,
    total_kicks: u64,
    stash_inserts: u64,
}

impl CuckooFilter {
    /// Returns a builder for creating a cuckoo filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilters::cuckoo::CuckooFilter;
    ///
    /// let filter = CuckooFilter::builder()
    ///     .with_accuracy(1000, 0.01)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(filter.fingerprint_bits(), 8);
    /// assert_eq!(filter.num_buckets(), 512);
    /// ```
    pub fn builder() -> CuckooFilterBuilder {
        CuckooFilterBuilder::default()
    }

    /// Adds a key.
    ///
    /// Tries both candidate buckets, then runs an eviction chain of at most
    /// `max_kicks` displacements, then falls back to the stash.
    ///
    /// # Errors
    ///
    /// [`OpError::CapacityExhausted`] when the chain and the stash are both
    /// exhausted. The chain is rolled back first, so no stored fingerprint is
    /// lost and the filter remains consistent.
    pub fn insert(&mut self, key: Key) -> Result<(), OpError> {
        self.insert_calls += 1;

        let (fp, i1, i2) = self.locate(key);
        if self.try_place(i1, fp) || self.try_place(i2, fp) {
            return Ok(());
        }

        let mut bucket = if self.rng.next_bool() { i1 } else { i2 };
        let mut current = fp;
        self.kick_path.clear();
        for _ in 0..self.max_kicks {
            let victim = bucket * self.bucket_size + self.rng.next_below(self.bucket_size);
            std::mem::swap(&mut current, &mut self.slots[victim]);
            self.kick_path.push(victim);
            self.total_kicks += 1;

            bucket = self.alt_index(bucket, current);
            if self.try_place(bucket, current) {
                return Ok(());
            }
        }

        if self.stash.len() < self.stash_capacity {
            self.stash.push(current);
            self.stash_inserts += 1;
            return Ok(());
        }

        // Undo the chain so the displaced fingerprints return to their slots.
        for &slot in self.kick_path.iter().rev() {
            std::mem::swap(&mut current, &mut self.slots[slot]);
        }
        debug_assert_eq!(current, fp);
        self.failures += 1;
        Err(OpError::CapacityExhausted)
    }

    /// Returns `true` if the key's fingerprint is in either candidate bucket or the stash.
    pub fn contains(&self, key: Key) -> bool {
        let (fp, i1, i2) = self.locate(key);
        self.bucket(i1).contains(&fp) || self.bucket(i2).contains(&fp) || self.stash.contains(&fp)
    }

    /// Removes one copy of the key's fingerprint, returning whether one was found.
    ///
    /// Erasing a key that was never inserted may remove a colliding
    /// fingerprint of another key. This is inherent to fingerprint storage.
    pub fn erase(&mut self, key: Key) -> Result<bool, OpError> {
        let (fp, i1, i2) = self.locate(key);
        for bucket in [i1, i2] {
            let start = bucket * self.bucket_size;
            if let Some(pos) = self.bucket(bucket).iter().position(|&v| v == fp) {
                self.slots[start + pos] = EMPTY;
                self.occupied -= 1;
                return Ok(true);
            }
        }
        if let Some(pos) = self.stash.iter().position(|&v| v == fp) {
            self.stash.swap_remove(pos);
            return Ok(true);
        }
        Ok(false)
    }

    /// Memory held by the bucket table and the stash, in bytes.
    pub fn bytes_used(&self) -> usize {
        (self.slots.len() + self.stash_capacity) * size_of::<u16>()
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Fingerprint width in bits.
    pub fn fingerprint_bits(&self) -> u32 {
        self.fingerprint_bits
    }

    /// Slots per bucket.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Number of buckets (a power of two).
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Total bucket slots, excluding the stash.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Maximum stash length.
    pub fn stash_capacity(&self) -> usize {
        self.stash_capacity
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Fraction of bucket slots holding a fingerprint.
    pub fn load_factor(&self) -> f64 {
        self.occupied as f64 / self.capacity() as f64
    }

    /// Number of insert calls so far.
    pub fn insert_calls(&self) -> u64 {
        self.insert_calls
    }

    /// Number of inserts rejected for lack of capacity.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Failed inserts / total inserts.
    pub fn failure_rate(&self) -> f64 {
        ratio(self.failures, self.insert_calls)
    }

    /// Total displacements performed, including rolled back ones.
    pub fn total_kicks(&self) -> u64 {
        self.total_kicks
    }

    /// Displacements per insert call.
    pub fn avg_kicks_per_insert(&self) -> f64 {
        ratio(self.total_kicks, self.insert_calls)
    }

    /// Current number of fingerprints in the stash.
    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }

    /// Number of inserts that ended in the stash.
    pub fn stash_inserts(&self) -> u64 {
        self.stash_inserts
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    #[inline]
    fn locate(&self, key: Key) -> (u16, usize, usize) {
        let fp = fingerprint(mix(key, self.seed), self.fingerprint_bits);
        let i1 = (mix(key, self.seed ^ INDEX_SEED_SALT) as usize) & (self.num_buckets - 1);
        (fp, i1, self.alt_index(i1, fp))
    }

    /// The other candidate bucket of `fp` when it sits in `index`. Symmetric:
    /// `alt_index(alt_index(i, fp), fp) == i`.
    #[inline]
    fn alt_index(&self, index: usize, fp: u16) -> usize {
        let h = mix(u64::from(fp), self.seed ^ ALT_SEED_SALT) as usize;
        index ^ (h & (self.num_buckets - 1))
    }

    #[inline]
    fn bucket(&self, index: usize) -> &[u16] {
        let start = index * self.bucket_size;
        &self.slots[start..start + self.bucket_size]
    }

    fn try_place(&mut self, index: usize, fp: u16) -> bool {
        debug_assert_ne!(fp, EMPTY);
        let start = index * self.bucket_size;
        match self.slots[start..start + self.bucket_size]
            .iter_mut()
            .find(|slot| **slot == EMPTY)
        {
            Some(slot) => {
                *slot = fp;
                self.occupied += 1;
                true
            }
            None => false,
        }
    }
}

impl Filter for CuckooFilter {
    fn insert(&mut self, key: Key) -> Result<(), OpError> {
        CuckooFilter::insert(self, key)
    }

    fn contains(&self, key: Key) -> bool {
        CuckooFilter::contains(self, key)
    }

    fn erase(&mut self, key: Key) -> Result<bool, OpError> {
        CuckooFilter::erase(self, key)
    }

    fn bytes_used(&self) -> usize {
        CuckooFilter::bytes_used(self)
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Cuckoo
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for creating [`CuckooFilter`] instances.
#[derive(Debug, Clone)]
pub struct CuckooFilterBuilder {
    accuracy: Option<(u64, f64)>,
    bucket_size: usize,
    fingerprint_bits_hint: u32,
    max_kicks: usize,
    stash_capacity: usize,
    seed: u64,
}

impl Default for CuckooFilterBuilder {
    fn default() -> Self {
        CuckooFilterBuilder {
            accuracy: None,
            bucket_size: DEFAULT_BUCKET_SIZE,
            fingerprint_bits_hint: DEFAULT_FINGERPRINT_BITS_HINT,
            max_kicks: DEFAULT_MAX_KICKS,
            stash_capacity: DEFAULT_STASH_CAPACITY,
            seed: DEFAULT_SEED,
        }
    }
}

impl CuckooFilterBuilder {
    /// Sizes the filter for `max_items` entries at false positive rate `fpp`.
    pub fn with_accuracy(mut self, max_items: u64, fpp: f64) -> Self {
        self.accuracy = Some((max_items, fpp));
        self
    }

    /// Sets the slots per bucket (default 4).
    pub fn bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Sets the minimum fingerprint width (default 8). Must be in `[4, 16]`.
    ///
    /// The effective width is `max(hint, ceil(-log2(fpp * bucket_size)))`, clamped to `[4, 16]`.
    pub fn fingerprint_bits_hint(mut self, bits: u32) -> Self {
        self.fingerprint_bits_hint = bits;
        self
    }

    /// Sets the eviction budget per insert (default 500).
    pub fn max_kicks(mut self, max_kicks: usize) -> Self {
        self.max_kicks = max_kicks;
        self
    }

    /// Sets the stash capacity (default 64).
    pub fn stash_capacity(mut self, stash_capacity: usize) -> Self {
        self.stash_capacity = stash_capacity;
        self
    }

    /// Sets the hash seed (default 3). Also seeds the eviction choices.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the filter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if no
    /// accuracy was given, `max_items` is 0, `fpp` is outside `(0, 1)`, the bucket size is
    /// outside `[1, 64]`, or the fingerprint hint is outside `[4, 16]`.
    pub fn build(self) -> Result<CuckooFilter, Error> {
        let Some((max_items, fpp)) = self.accuracy else {
            return Err(Error::config_invalid("must call with_accuracy() before build()"));
        };
        check_accuracy(max_items, fpp)?;
        if self.bucket_size == 0 || self.bucket_size > MAX_BUCKET_SIZE {
            return Err(Error::config_invalid("bucket_size must be in [1, 64]")
                .with_context("bucket_size", self.bucket_size));
        }
        let hint = self.fingerprint_bits_hint;
        if !(MIN_FINGERPRINT_BITS..=MAX_FINGERPRINT_BITS).contains(&hint) {
            return Err(
                Error::config_invalid("fingerprint_bits_hint must be in [4, 16]")
                    .with_context("fingerprint_bits_hint", hint),
            );
        }

        let fingerprint_bits = derive_fingerprint_bits(hint, fpp, self.bucket_size as f64);
        let wanted = (max_items as f64 / (TARGET_LOAD_FACTOR * self.bucket_size as f64)).ceil();
        let num_buckets = (wanted as usize).max(1).next_power_of_two();
        debug!(
            num_buckets,
            bucket_size = self.bucket_size,
            fingerprint_bits,
            "built cuckoo filter"
        );

        Ok(CuckooFilter {
            seed: self.seed,
            fingerprint_bits,
            bucket_size: self.bucket_size,
            num_buckets,
            max_kicks: self.max_kicks,
            stash_capacity: self.stash_capacity,
            slots: vec![EMPTY; num_buckets * self.bucket_size],
            stash: Vec::with_capacity(self.stash_capacity),
            occupied: 0,
            rng: SplitMix64::seeded(self.seed),
            kick_path: Vec::new(),
            insert_calls: 0,
            failures: 0,
            total_kicks: 0,
            stash_inserts: 0,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
