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

//! Key sets and operation streams for benchmark runs.
//!
//! Everything here is deterministic in its seed: the same arguments always
//! produce the same keys and the same operation sequence.

use std::collections::HashSet;
use std::fmt;

use crate::error::Error;
use crate::filter::Key;
use crate::hash::RandomSource;
use crate::hash::SplitMix64;

/// Tolerance when checking that mix fractions sum to one.
const MIX_SUM_TOLERANCE: f64 = 1e-9;

/// Returns `n` pseudo-random keys drawn from a [`SplitMix64`] seeded with `seed`.
///
/// Keys may repeat in principle; with 64-bit outputs this is vanishingly rare.
pub fn make_keys(n: usize, seed: u64) -> Vec<Key> {
    let mut rng = SplitMix64::seeded(seed);
    (0..n).map(|_| rng.next()).collect()
}

/// Returns `(positives, negatives)`, each of `n` distinct keys, with no key in both.
pub fn make_disjoint_keys(n: usize, seed: u64) -> (Vec<Key>, Vec<Key>) {
    let mut rng = SplitMix64::seeded(seed);
    let mut seen = HashSet::with_capacity(2 * n);
    let mut draw = |rng: &mut SplitMix64| loop {
        let key = rng.next();
        if seen.insert(key) {
            return key;
        }
    };
    let positives = (0..n).map(|_| draw(&mut rng)).collect();
    let negatives = (0..n).map(|_| draw(&mut rng)).collect();
    (positives, negatives)
}

/// Fractions of queries, inserts and deletes in an operation stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadMix {
    query: f64,
    insert: f64,
    delete: f64,
}

impl WorkloadMix {
    /// Creates a mix.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if a fraction is
    /// negative or the three do not sum to 1.
    pub fn new(query: f64, insert: f64, delete: f64) -> Result<Self, Error> {
        let fractions = [query, insert, delete];
        if fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(Error::config_invalid("mix fractions must be non-negative")
                .with_context("query", query)
                .with_context("insert", insert)
                .with_context("delete", delete));
        }
        let sum: f64 = fractions.iter().sum();
        if (sum - 1.0).abs() > MIX_SUM_TOLERANCE {
            return Err(Error::config_invalid("mix fractions must sum to 1")
                .with_context("query", query)
                .with_context("insert", insert)
                .with_context("delete", delete)
                .with_context("sum", sum));
        }
        Ok(WorkloadMix {
            query,
            insert,
            delete,
        })
    }

    /// Fraction of queries.
    pub fn query(&self) -> f64 {
        self.query
    }

    /// Fraction of inserts.
    pub fn insert(&self) -> f64 {
        self.insert
    }

    /// Fraction of deletes.
    pub fn delete(&self) -> f64 {
        self.delete
    }

    /// Whether the mix contains any inserts or deletes.
    pub fn has_writes(&self) -> bool {
        self.insert > 0.0 || self.delete > 0.0
    }
}

/// Named operation mixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadType {
    /// Queries only.
    ReadOnly,
    /// 95% queries, 5% inserts.
    ReadMostly,
    /// 50% queries, 50% inserts.
    Balanced,
    /// 50% queries, 25% inserts, 25% deletes.
    Churn,
}

impl WorkloadType {
    /// The operation mix of this preset.
    pub const fn mix(self) -> WorkloadMix {
        let (query, insert, delete) = match self {
            WorkloadType::ReadOnly => (1.0, 0.0, 0.0),
            WorkloadType::ReadMostly => (0.95, 0.05, 0.0),
            WorkloadType::Balanced => (0.5, 0.5, 0.0),
            WorkloadType::Churn => (0.5, 0.25, 0.25),
        };
        WorkloadMix {
            query,
            insert,
            delete,
        }
    }

    /// Name used in reports.
    pub const fn name(self) -> &'static str {
        match self {
            WorkloadType::ReadOnly => "read_only",
            WorkloadType::ReadMostly => "read_mostly",
            WorkloadType::Balanced => "balanced",
            WorkloadType::Churn => "churn",
        }
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Membership query; `expect_present` is false for keys from the negative set.
    Query { key: Key, expect_present: bool },
    /// Insert a positive key.
    Insert(Key),
    /// Delete a positive key.
    Delete(Key),
}

impl Operation {
    /// The key this operation touches.
    pub fn key(&self) -> Key {
        match *self {
            Operation::Query { key, .. } | Operation::Insert(key) | Operation::Delete(key) => key,
        }
    }

    /// Whether the operation mutates the filter.
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Query { .. })
    }
}

/// Generates operation streams from a mix.
///
/// Keys are taken round-robin from the positive and negative sets. Queries
/// and inserts share one positive cursor; deletes have their own, so a
/// stream with both walks the positive set twice in parallel.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    mix: WorkloadMix,
    negative_share: f64,
    rng: SplitMix64,
}

impl WorkloadGenerator {
    /// Creates a generator.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if
    /// `negative_share` is outside `[0, 1]`.
    pub fn new(mix: WorkloadMix, negative_share: f64, seed: u64) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&negative_share) {
            return Err(Error::config_invalid("negative_share must be in [0, 1]")
                .with_context("negative_share", negative_share));
        }
        Ok(WorkloadGenerator {
            mix,
            negative_share,
            rng: SplitMix64::seeded(seed),
        })
    }

    /// Generates `n_ops` operations.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if the mix
    /// needs keys from a set that is empty.
    pub fn generate(
        &mut self,
        n_ops: usize,
        positives: &[Key],
        negatives: &[Key],
    ) -> Result<Vec<Operation>, Error> {
        let needs_positives =
            self.mix.has_writes() || (self.mix.query > 0.0 && self.negative_share < 1.0);
        if needs_positives && positives.is_empty() {
            return Err(Error::config_invalid("workload needs positive keys"));
        }
        if self.mix.query > 0.0 && self.negative_share > 0.0 && negatives.is_empty() {
            return Err(Error::config_invalid("workload needs negative keys"));
        }

        let mut ops = Vec::with_capacity(n_ops);
        let mut pos_idx = 0usize;
        let mut neg_idx = 0usize;
        let mut del_idx = 0usize;
        for _ in 0..n_ops {
            let r = self.rng.next_f64();
            let op = if r < self.mix.query {
                if self.rng.next_f64() < self.negative_share {
                    let key = negatives[neg_idx % negatives.len()];
                    neg_idx += 1;
                    Operation::Query {
                        key,
                        expect_present: false,
                    }
                } else {
                    let key = positives[pos_idx % positives.len()];
                    pos_idx += 1;
                    Operation::Query {
                        key,
                        expect_present: true,
                    }
                }
            } else if r < self.mix.query + self.mix.insert {
                let key = positives[pos_idx % positives.len()];
                pos_idx += 1;
                Operation::Insert(key)
            } else {
                let key = positives[del_idx % positives.len()];
                del_idx += 1;
                Operation::Delete(key)
            };
            ops.push(op);
        }
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_make_keys_deterministic() {
        assert_eq!(make_keys(100, 42), make_keys(100, 42));
        assert_ne!(make_keys(100, 42), make_keys(100, 43));
    }

    #[test]
    fn test_disjoint_keys() {
        let (pos, neg) = make_disjoint_keys(10_000, 7);
        assert_eq!(pos.len(), 10_000);
        assert_eq!(neg.len(), 10_000);
        let pos_set: HashSet<_> = pos.iter().copied().collect();
        assert_eq!(pos_set.len(), pos.len());
        assert!(neg.iter().all(|k| !pos_set.contains(k)));
    }

    #[test]
    fn test_presets_are_valid() {
        for wt in [
            WorkloadType::ReadOnly,
            WorkloadType::ReadMostly,
            WorkloadType::Balanced,
            WorkloadType::Churn,
        ] {
            let mix = wt.mix();
            assert!(WorkloadMix::new(mix.query(), mix.insert(), mix.delete()).is_ok());
        }
        assert!(!WorkloadType::ReadOnly.mix().has_writes());
        assert_eq!(WorkloadType::ReadMostly.to_string(), "read_mostly");
    }

    #[test]
    fn test_invalid_mix() {
        let err = WorkloadMix::new(0.5, 0.4, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        let err = WorkloadMix::new(1.5, -0.5, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        let err = WorkloadGenerator::new(WorkloadType::ReadOnly.mix(), 1.5, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_mix_proportions() {
        let (pos, neg) = make_disjoint_keys(1_000, 1);
        let mut generator = WorkloadGenerator::new(WorkloadType::Churn.mix(), 0.5, 9).unwrap();
        let ops = generator.generate(100_000, &pos, &neg).unwrap();

        let inserts = ops
            .iter()
            .filter(|op| matches!(op, Operation::Insert(_)))
            .count();
        let deletes = ops
            .iter()
            .filter(|op| matches!(op, Operation::Delete(_)))
            .count();
        let neg_set: HashSet<Key> = neg.iter().copied().collect();
        let negatives = ops
            .iter()
            .filter(|op| !op.is_write() && neg_set.contains(&op.key()))
            .count();
        assert!((24_000..26_000).contains(&inserts), "inserts {inserts}");
        assert!((24_000..26_000).contains(&deletes), "deletes {deletes}");
        assert!(
            (24_000..26_000).contains(&negatives),
            "negatives {negatives}"
        );
    }

    #[test]
    fn test_operation_key_and_write_flag() {
        let query = Operation::Query {
            key: 4,
            expect_present: false,
        };
        assert_eq!(query.key(), 4);
        assert!(!query.is_write());
        assert_eq!(Operation::Insert(5).key(), 5);
        assert!(Operation::Insert(5).is_write());
        assert_eq!(Operation::Delete(6).key(), 6);
        assert!(Operation::Delete(6).is_write());

        let (pos, neg) = make_disjoint_keys(100, 2);
        let ops = WorkloadGenerator::new(WorkloadType::Balanced.mix(), 0.0, 4)
            .unwrap()
            .generate(1_000, &pos, &neg)
            .unwrap();
        let writes = ops.iter().filter(|op| op.is_write()).count();
        assert!((400..600).contains(&writes), "writes {writes}");
        assert!(ops.iter().all(|op| pos.contains(&op.key())));
    }

    #[test]
    fn test_generate_deterministic() {
        let (pos, neg) = make_disjoint_keys(100, 1);
        let run = || {
            WorkloadGenerator::new(WorkloadType::ReadMostly.mix(), 0.3, 5)
                .unwrap()
                .generate(1_000, &pos, &neg)
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_query_flags_match_key_sets() {
        let (pos, neg) = make_disjoint_keys(50, 3);
        let ops = WorkloadGenerator::new(WorkloadType::ReadOnly.mix(), 0.5, 1)
            .unwrap()
            .generate(500, &pos, &neg)
            .unwrap();
        for op in ops {
            match op {
                Operation::Query {
                    key,
                    expect_present: true,
                } => assert!(pos.contains(&key)),
                Operation::Query {
                    key,
                    expect_present: false,
                } => assert!(neg.contains(&key)),
                _ => panic!("read-only stream produced {op:?}"),
            }
        }
    }

    #[test]
    fn test_missing_keys() {
        let err = WorkloadGenerator::new(WorkloadType::ReadOnly.mix(), 0.5, 1)
            .unwrap()
            .generate(10, &[1, 2], &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
