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

//! Seeded random sources for filters and workloads.

use super::splitmix64;

/// Random number source for filters and workload generators.
pub trait RandomSource {
    /// Returns the next random 64-bit value.
    fn next_u64(&mut self) -> u64;

    /// Returns a random boolean value.
    fn next_bool(&mut self) -> bool {
        (self.next_u64() & 1) != 0
    }

    /// Returns a uniformly distributed value in `[0.0, 1.0)`.
    fn next_f64(&mut self) -> f64 {
        // 53 high bits fill the mantissa exactly.
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Returns a value in `[0, bound)`.
    ///
    /// Uses the multiply-shift reduction, so the bias is at most `bound / 2^64`.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is 0.
    fn next_below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be at least 1");
        ((self.next_u64() as u128 * bound as u128) >> 64) as usize
    }
}

/// SplitMix64 generator.
///
/// The same seed always reproduces the same sequence, which is what makes
/// experiment runs comparable across trials and machines.
///
/// # Examples
///
/// ```
/// use amqfilters::hash::RandomSource;
/// use amqfilters::hash::SplitMix64;
///
/// let mut a = SplitMix64::seeded(42);
/// let mut b = SplitMix64::seeded(42);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    /// Creates a new generator using the provided seed.
    pub fn seeded(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Returns the next value of the sequence.
    ///
    /// Inherent alias of [`RandomSource::next_u64`] so callers do not need the trait in scope.
    #[inline]
    pub fn next(&mut self) -> u64 {
        splitmix64(&mut self.state)
    }
}

impl RandomSource for SplitMix64 {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sequence() {
        // Reference values of splitmix64 seeded with 0.
        let mut rng = SplitMix64::seeded(0);
        assert_eq!(rng.next(), 0xe220_a839_7b1d_cdaf);
        assert_eq!(rng.next(), 0x6e78_9e6a_a1b9_65f4);
        assert_eq!(rng.next(), 0x06c4_5d18_8009_454f);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a: Vec<u64> = {
            let mut rng = SplitMix64::seeded(7);
            (0..100).map(|_| rng.next_u64()).collect()
        };
        let b: Vec<u64> = {
            let mut rng = SplitMix64::seeded(7);
            (0..100).map(|_| rng.next_u64()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_next_f64_in_unit_interval() {
        let mut rng = SplitMix64::seeded(99);
        for _ in 0..10_000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_next_below_bounds() {
        let mut rng = SplitMix64::seeded(5);
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            let v = rng.next_below(4);
            assert!(v < 4);
            seen[v] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
