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

use std::ops::RangeInclusive;

use tracing::debug;

use crate::error::Error;
use crate::error::OpError;
use crate::filter::Filter;
use crate::filter::FilterKind;
use crate::filter::Key;
use crate::hash::check_accuracy;
use crate::hash::mix;

/// Default block size in bits (one 64-byte cache line).
pub const DEFAULT_BLOCK_BITS: usize = 512;

const DEFAULT_SEED1: u64 = 1;
const DEFAULT_SEED2: u64 = 2;
const BLOCK_BITS_RANGE: RangeInclusive<usize> = 64..=1 << 20;
const MAX_NUM_HASHES: u32 = 100;

/// A blocked Bloom filter for probabilistic set membership testing.
///
/// All `k` bit positions of a key land in one block, so a lookup touches a single
/// cache line. The filter is insert-only: erase is not supported.
///
/// Use [`BlockedBloomFilterBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedBloomFilter {
    /// Seed of the block-selection hash
    seed1: u64,
    /// Seed of the in-block offset hash
    seed2: u64,
    /// Number of hash functions per key (k)
    num_hashes: u32,
    /// Bits per block, a power of two
    block_bits: usize,
    num_blocks: usize,
    /// Count of bits set to 1 (for statistics)
    num_bits_set: u64,
    /// Bit array packed into u64 words, `num_blocks * block_bits / 64` long
    bit_array: Vec<u64>,
}

impl BlockedBloomFilter {
    /// Returns a builder for creating a blocked Bloom filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilters::bloom::BlockedBloomFilter;
    ///
    /// // By accuracy (recommended)
    /// let filter = BlockedBloomFilter::builder()
    ///     .with_accuracy(1000, 0.01)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(filter.num_hashes(), 7);
    ///
    /// // By size (manual)
    /// let filter = BlockedBloomFilter::builder()
    ///     .with_size(4096, 5)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(filter.num_bits(), 4096);
    /// ```
    pub fn builder() -> BlockedBloomFilterBuilder {
        BlockedBloomFilterBuilder::default()
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Tests whether a key is possibly in the set.
    ///
    /// Returns:
    /// - `true`: Key was **possibly** inserted (or false positive)
    /// - `false`: Key was **definitely not** inserted
    ///
    /// # Examples
    ///
    /// ```
    /// # use amqfilters::bloom::BlockedBloomFilter;
    /// let mut filter = BlockedBloomFilter::builder()
    ///     .with_accuracy(100, 0.01)
    ///     .build()
    ///     .unwrap();
    /// filter.insert(42).unwrap();
    ///
    /// assert!(filter.contains(42));
    /// ```
    pub fn contains(&self, key: Key) -> bool {
        let pattern = self.bit_pattern(key);
        (0..self.num_hashes).all(|i| self.get_bit(pattern.bit_index(i)))
    }

    // ========================================================================
    // Update Operations
    // ========================================================================

    /// Inserts a key into the filter. Never fails.
    ///
    /// After insertion, `contains(key)` will always return `true`.
    pub fn insert(&mut self, key: Key) -> Result<(), OpError> {
        let pattern = self.bit_pattern(key);
        for i in 0..self.num_hashes {
            self.set_bit(pattern.bit_index(i));
        }
        Ok(())
    }

    /// Always fails: a plain Bloom filter cannot forget a key.
    pub fn erase(&mut self, _key: Key) -> Result<bool, OpError> {
        Err(OpError::Unsupported)
    }

    /// Resets the filter to its initial empty state.
    ///
    /// Clears all bits while preserving capacity and configuration.
    pub fn reset(&mut self) {
        for word in &mut self.bit_array {
            *word = 0;
        }
        self.num_bits_set = 0;
    }

    // ========================================================================
    // Statistics and Properties
    // ========================================================================

    /// Returns whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.num_bits_set == 0
    }

    /// Returns the number of bits set to 1.
    pub fn bits_set(&self) -> u64 {
        self.num_bits_set
    }

    /// Returns the total number of bits in the filter (m).
    pub fn num_bits(&self) -> u64 {
        (self.num_blocks * self.block_bits) as u64
    }

    /// Returns the number of hash functions per key (k).
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Returns the block size in bits.
    pub fn block_bits(&self) -> usize {
        self.block_bits
    }

    /// Returns the number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Memory held by the bit array, in bytes.
    pub fn bytes_used(&self) -> usize {
        self.bit_array.len() * size_of::<u64>()
    }

    /// Returns the fraction of bits set.
    ///
    /// Values near 0.5 indicate the filter is at its design capacity.
    pub fn load_factor(&self) -> f64 {
        self.num_bits_set as f64 / self.num_bits() as f64
    }

    /// Estimates the current false positive probability from the fill ratio.
    ///
    /// Uses `load_factor^k`, which assumes uniformly distributed set bits.
    pub fn estimated_fpp(&self) -> f64 {
        self.load_factor().powi(self.num_hashes as i32)
    }

    /// Theoretical false positive probability after `num_items` insertions.
    ///
    /// Formula: `(1 - e^(-k*n/m))^k`
    pub fn theoretical_fpp(&self, num_items: u64) -> f64 {
        let k = self.num_hashes as f64;
        let n = num_items as f64;
        let m = self.num_bits() as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    fn bit_pattern(&self, key: Key) -> BitPattern {
        let h1 = mix(key, self.seed1);
        let h2 = mix(key, self.seed2);
        let block = (h1 % self.num_blocks as u64) as usize;
        BitPattern {
            base: block * self.block_bits,
            mask: self.block_bits - 1,
            lo: h2 as u32,
            // odd step so the k offsets are distinct whenever k <= block_bits
            hi: ((h2 >> 32) as u32) | 1,
        }
    }

    /// Gets the value of a single bit.
    fn get_bit(&self, bit_index: usize) -> bool {
        let mask = 1u64 << (bit_index % 64);
        (self.bit_array[bit_index / 64] & mask) != 0
    }

    /// Sets a single bit and updates the count if it wasn't already set.
    fn set_bit(&mut self, bit_index: usize) {
        let word = &mut self.bit_array[bit_index / 64];
        let mask = 1u64 << (bit_index % 64);
        if (*word & mask) == 0 {
            *word |= mask;
            self.num_bits_set += 1;
        }
    }
}

impl Filter for BlockedBloomFilter {
    fn insert(&mut self, key: Key) -> Result<(), OpError> {
        BlockedBloomFilter::insert(self, key)
    }

    fn contains(&self, key: Key) -> bool {
        BlockedBloomFilter::contains(self, key)
    }

    fn erase(&mut self, key: Key) -> Result<bool, OpError> {
        BlockedBloomFilter::erase(self, key)
    }

    fn bytes_used(&self) -> usize {
        BlockedBloomFilter::bytes_used(self)
    }

    fn kind(&self) -> FilterKind {
        FilterKind::BlockedBloom
    }
}

/// Block position and double-hashing state of one key.
#[derive(Debug, Clone, Copy)]
struct BitPattern {
    base: usize,
    mask: usize,
    lo: u32,
    hi: u32,
}

impl BitPattern {
    /// Index of the `i`-th bit: `base + ((lo + i * hi) mod block_bits)`.
    #[inline]
    fn bit_index(&self, i: u32) -> usize {
        let offset = self.lo.wrapping_add(i.wrapping_mul(self.hi)) as usize & self.mask;
        self.base + offset
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Sizing {
    Accuracy { max_items: u64, fpp: f64 },
    Size { num_bits: u64, num_hashes: u32 },
}

/// Builder for creating [`BlockedBloomFilter`] instances.
///
/// Provides two construction modes:
/// - [`with_accuracy()`](Self::with_accuracy): target items and false positive rate
/// - [`with_size()`](Self::with_size): exact bit count and hash count
#[derive(Debug, Clone)]
pub struct BlockedBloomFilterBuilder {
    sizing: Option<Sizing>,
    block_bits: usize,
    seed1: u64,
    seed2: u64,
}

impl Default for BlockedBloomFilterBuilder {
    fn default() -> Self {
        BlockedBloomFilterBuilder {
            sizing: None,
            block_bits: DEFAULT_BLOCK_BITS,
            seed1: DEFAULT_SEED1,
            seed2: DEFAULT_SEED2,
        }
    }
}

impl BlockedBloomFilterBuilder {
    /// Sizes the filter for `max_items` entries at false positive rate `fpp`.
    ///
    /// The bit count comes from the standard capacity formula and is rounded
    /// up to whole blocks; the hash count is derived from the rounded size.
    pub fn with_accuracy(mut self, max_items: u64, fpp: f64) -> Self {
        self.sizing = Some(Sizing::Accuracy { max_items, fpp });
        self
    }

    /// Sizes the filter manually. `num_bits` is rounded up to whole blocks.
    pub fn with_size(mut self, num_bits: u64, num_hashes: u32) -> Self {
        self.sizing = Some(Sizing::Size {
            num_bits,
            num_hashes,
        });
        self
    }

    /// Sets the block size in bits (default 512). Must be a power of two, at least 64.
    pub fn block_bits(mut self, block_bits: usize) -> Self {
        self.block_bits = block_bits;
        self
    }

    /// Sets the block-selection and in-block offset hash seeds (default 1 and 2).
    pub fn seeds(mut self, seed1: u64, seed2: u64) -> Self {
        self.seed1 = seed1;
        self.seed2 = seed2;
        self
    }

    /// Builds the filter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if no
    /// sizing was given, `max_items` is 0, `fpp` is outside `(0, 1)`, the block size is
    /// not a power of two in `[64, 2^20]`, or the hash count is outside `[1, 100]`.
    pub fn build(self) -> Result<BlockedBloomFilter, Error> {
        let block_bits = self.block_bits;
        if !block_bits.is_power_of_two() || !BLOCK_BITS_RANGE.contains(&block_bits) {
            return Err(
                Error::config_invalid("block_bits must be a power of two in [64, 2^20]")
                    .with_context("block_bits", block_bits),
            );
        }

        let (num_bits, num_hashes) = match self.sizing {
            None => {
                return Err(Error::config_invalid(
                    "must call with_accuracy() or with_size() before build()",
                ));
            }
            Some(Sizing::Accuracy { max_items, fpp }) => {
                check_accuracy(max_items, fpp)?;
                let num_bits = round_to_blocks(suggest_num_bits(max_items, fpp), block_bits);
                (num_bits, suggest_num_hashes(max_items, num_bits))
            }
            Some(Sizing::Size {
                num_bits,
                num_hashes,
            }) => {
                if num_bits == 0 {
                    return Err(Error::config_invalid("num_bits must be greater than 0"));
                }
                if num_hashes == 0 || num_hashes > MAX_NUM_HASHES {
                    return Err(Error::config_invalid("num_hashes must be in [1, 100]")
                        .with_context("num_hashes", num_hashes));
                }
                (round_to_blocks(num_bits, block_bits), num_hashes)
            }
        };

        let num_blocks = (num_bits / block_bits as u64) as usize;
        debug!(
            num_bits,
            num_blocks,
            num_hashes,
            block_bits,
            "built blocked bloom filter"
        );

        Ok(BlockedBloomFilter {
            seed1: self.seed1,
            seed2: self.seed2,
            num_hashes,
            block_bits,
            num_blocks,
            num_bits_set: 0,
            bit_array: vec![0u64; (num_bits / 64) as usize],
        })
    }
}

/// Suggests the number of bits for `max_items` entries at false positive rate `fpp`.
///
/// Formula: `m = ceil(-n * ln(p) / ln(2)^2)`
///
/// # Examples
///
/// ```
/// # use amqfilters::bloom::suggest_num_bits;
/// assert_eq!(suggest_num_bits(1000, 0.01), 9586);
/// ```
pub fn suggest_num_bits(max_items: u64, fpp: f64) -> u64 {
    let n = max_items as f64;
    let ln2_squared = std::f64::consts::LN_2 * std::f64::consts::LN_2;
    (-n * fpp.ln() / ln2_squared).ceil() as u64
}

/// Suggests the number of hash functions for `max_items` entries in `num_bits` bits.
///
/// Formula: `k = round((m/n) * ln(2))`, at least 1.
///
/// # Examples
///
/// ```
/// # use amqfilters::bloom::suggest_num_hashes;
/// assert_eq!(suggest_num_hashes(1000, 10000), 7); // k ≈ 6.93
/// ```
pub fn suggest_num_hashes(max_items: u64, num_bits: u64) -> u32 {
    let k = (num_bits as f64 / max_items as f64 * std::f64::consts::LN_2).round();
    (k as u32).clamp(1, MAX_NUM_HASHES)
}

fn round_to_blocks(num_bits: u64, block_bits: usize) -> u64 {
    num_bits.max(1).div_ceil(block_bits as u64) * block_bits as u64
}

// ============================================================================
// Tests
// ============================================================================
