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

//! Hash utilities shared by every filter and workload generator.
//!
//! All randomness in this crate is derived from two primitives:
//!
//! - [`mix`]: a seedable splitmix64-style integer finaliser with full avalanche.
//! - [`SplitMix64`]: a seeded pseudo-random generator.
//!
//! Neither is cryptographically secure. They only need to be uniform enough
//! that measured false-positive rates reflect the filter structure rather than
//! hash weakness.
//!
//! # Usage
//!
//! ```rust
//! use amqfilters::hash::fingerprint;
//! use amqfilters::hash::mix;
//!
//! let h = mix(42, 7);
//! assert_eq!(h, mix(42, 7));
//! assert_ne!(h, mix(42, 8));
//!
//! // fingerprints are never zero, zero marks an empty slot
//! assert_ne!(fingerprint(0, 8), 0);
//! ```

mod random;

pub use self::random::RandomSource;
pub use self::random::SplitMix64;

use crate::error::Error;

/// The splitmix64 increment (the 64-bit golden ratio).
pub const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Smallest supported fingerprint / remainder width in bits.
pub const MIN_FINGERPRINT_BITS: u32 = 4;

/// Largest supported fingerprint / remainder width in bits.
pub const MAX_FINGERPRINT_BITS: u32 = 16;

/// Hashes `key` under `seed`.
///
/// The seed is folded in before the splitmix64 finaliser, so distinct seeds
/// give independent-looking hash functions over the same key.
#[inline]
pub fn mix(key: u64, seed: u64) -> u64 {
    let mut z = (key ^ seed).wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Advances `state` and returns the next splitmix64 output.
#[inline]
pub fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(GOLDEN_GAMMA);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Derives a nonzero fingerprint of `bits` bits from `hash`.
///
/// A masked value of 0 is re-mapped to 1 because 0 is the empty-slot sentinel.
#[inline]
pub fn fingerprint(hash: u64, bits: u32) -> u16 {
    debug_assert!((MIN_FINGERPRINT_BITS..=MAX_FINGERPRINT_BITS).contains(&bits));
    let fp = (hash & fingerprint_mask(bits)) as u16;
    if fp == 0 { 1 } else { fp }
}

/// Mask covering the low `bits` bits.
#[inline]
pub(crate) fn fingerprint_mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

/// Derives a fingerprint width from a target false-positive rate.
///
/// Returns `max(hint, ceil(-log2(fpr · divisor)))` clamped to the supported range.
/// The hint itself must already be within range; callers validate it.
pub(crate) fn derive_fingerprint_bits(hint: u32, fpr: f64, divisor: f64) -> u32 {
    let from_fpr = (-(fpr * divisor).log2()).ceil();
    let bits = if from_fpr > 0.0 {
        hint.max(from_fpr as u32)
    } else {
        hint
    };
    bits.clamp(MIN_FINGERPRINT_BITS, MAX_FINGERPRINT_BITS)
}

/// Validates a `(max_items, fpp)` accuracy target.
pub(crate) fn check_accuracy(max_items: u64, fpp: f64) -> Result<(), Error> {
    if max_items == 0 {
        return Err(Error::config_invalid("max_items must be greater than 0"));
    }
    if !(fpp > 0.0 && fpp < 1.0) {
        return Err(
            Error::config_invalid("fpp must be between 0.0 and 1.0 (exclusive)")
                .with_context("fpp", fpp),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_matches_splitmix_step() {
        // mix(key, 0) is one splitmix64 step started from `key`.
        let mut state = 12345u64;
        assert_eq!(mix(12345, 0), splitmix64(&mut state));
    }

    #[test]
    fn test_mix_avalanche() {
        // Flipping one input bit should flip roughly half of the output bits.
        let mut total = 0u32;
        let samples = 1_000u64;
        for key in 0..samples {
            total += (mix(key, 9) ^ mix(key ^ 1, 9)).count_ones();
        }
        let avg = total as f64 / samples as f64;
        assert!((28.0..36.0).contains(&avg), "average flipped bits {avg}");
    }

    #[test]
    fn test_fingerprint_never_zero() {
        assert_eq!(fingerprint(0, 4), 1);
        assert_eq!(fingerprint(0x10, 4), 1);
        assert_eq!(fingerprint(0xabcd, 16), 0xabcd);
        assert_eq!(fingerprint(0xabcd, 8), 0xcd);
    }

    #[test]
    fn test_derive_fingerprint_bits() {
        // ceil(-log2(0.01)) = 7, hint wins.
        assert_eq!(derive_fingerprint_bits(8, 0.01, 1.0), 8);
        // ceil(-log2(0.001)) = 10
        assert_eq!(derive_fingerprint_bits(8, 0.001, 1.0), 10);
        // ceil(-log2(0.01 * 4)) = 5, hint wins.
        assert_eq!(derive_fingerprint_bits(4, 0.01, 4.0), 5);
        // clamped at the top
        assert_eq!(derive_fingerprint_bits(8, 1e-9, 1.0), MAX_FINGERPRINT_BITS);
    }

    #[test]
    fn test_check_accuracy() {
        assert!(check_accuracy(1, 0.5).is_ok());
        assert!(check_accuracy(0, 0.01).is_err());
        for fpp in [0.0, 1.0, -0.1, f64::NAN] {
            let err = check_accuracy(100, fpp).unwrap_err();
            assert!(err.message().contains("fpp must be between"), "{fpp}");
        }
    }
}
