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

use amqfilters::bloom::BlockedBloomFilter;
use amqfilters::cuckoo::CuckooFilter;
use amqfilters::filter::AnyFilter;
use amqfilters::filter::Filter;
use amqfilters::filter::FilterKind;
use amqfilters::harness::bits_per_entry;
use amqfilters::harness::measure_false_positive_rate;
use amqfilters::quotient::QuotientFilter;
use amqfilters::workload::make_disjoint_keys;
use amqfilters::xor::XorFilter;
use googletest::assert_that;
use googletest::prelude::le;
use googletest::prelude::lt;

fn build_loaded(kind: FilterKind, n: usize, p: f64, keys: &[u64]) -> AnyFilter {
    let mut filter: AnyFilter = match kind {
        FilterKind::BlockedBloom => BlockedBloomFilter::builder()
            .with_accuracy(n as u64, p)
            .build()
            .unwrap()
            .into(),
        FilterKind::Cuckoo => CuckooFilter::builder()
            .with_accuracy(n as u64, p)
            .build()
            .unwrap()
            .into(),
        FilterKind::Quotient => QuotientFilter::builder()
            .with_accuracy(n as u64, p)
            .build()
            .unwrap()
            .into(),
        FilterKind::Xor => {
            return XorFilter::builder()
                .target_fpr(p)
                .build(keys)
                .unwrap()
                .into();
        }
    };
    for &key in keys {
        filter.insert(key).unwrap();
    }
    filter
}

#[test]
fn test_no_false_negatives() {
    let (positives, _) = make_disjoint_keys(20_000, 17);
    for kind in FilterKind::ALL {
        let filter = build_loaded(kind, positives.len(), 0.01, &positives);
        assert_eq!(filter.kind(), kind);
        let misses = positives.iter().filter(|&&k| !filter.contains(k)).count();
        assert_eq!(misses, 0, "{kind} missed inserted keys");
    }
}

#[test]
fn test_false_positive_rate_bounded() {
    let (positives, negatives) = make_disjoint_keys(10_000, 23);
    for kind in FilterKind::ALL {
        let filter = build_loaded(kind, positives.len(), 0.01, &positives);
        let fpr = measure_false_positive_rate(&filter, &negatives);
        assert_that!(fpr, le(0.03));
    }
}

#[test]
fn test_space_accounting() {
    for n in [1_000usize, 1_000_000] {
        let bloom = BlockedBloomFilter::builder()
            .with_accuracy(n as u64, 0.01)
            .build()
            .unwrap();
        assert_eq!(
            bits_per_entry(&bloom, n),
            bloom.num_bits() as f64 / n as f64
        );
        assert_eq!(bloom.num_bits() % bloom.block_bits() as u64, 0);

        let cuckoo = CuckooFilter::builder()
            .with_accuracy(n as u64, 0.01)
            .build()
            .unwrap();
        let slots = cuckoo.capacity() + cuckoo.stash_capacity();
        assert_eq!(bits_per_entry(&cuckoo, n), (slots * 16) as f64 / n as f64);

        let quotient = QuotientFilter::builder()
            .with_accuracy(n as u64, 0.01)
            .build()
            .unwrap();
        assert_eq!(
            bits_per_entry(&quotient, n),
            (quotient.capacity() * 24) as f64 / n as f64
        );

        let keys: Vec<u64> = (0..n as u64).collect();
        let xor = XorFilter::builder().max_attempts(10).build(&keys).unwrap();
        assert_eq!(bits_per_entry(&xor, n), (xor.len() * 16) as f64 / n as f64);
    }
}

#[test]
fn test_cuckoo_concrete_scenario() {
    let mut filter = CuckooFilter::builder()
        .with_accuracy(1000, 0.01)
        .bucket_size(4)
        .build()
        .unwrap();
    for key in 1..=1000u64 {
        filter.insert(key).unwrap();
    }
    assert!((1..=1000u64).all(|k| filter.contains(k)));

    let hits = (100_001..=101_000u64)
        .filter(|&k| filter.contains(k))
        .count();
    assert_that!(hits as f64 / 1000.0, lt(0.05));
    assert_eq!(filter.failures(), 0);
}

#[test]
fn test_cuckoo_erase_of_absent_keys() {
    // Erasing a key that was never inserted either finds nothing or removes a
    // colliding fingerprint. Each such removal hides at most one stored key.
    let (positives, negatives) = make_disjoint_keys(1_000, 31);
    let mut filter = CuckooFilter::builder()
        .with_accuracy(1_000, 0.01)
        .build()
        .unwrap();
    for &key in &positives {
        filter.insert(key).unwrap();
    }

    let mut removed = 0;
    for &key in &negatives {
        if filter.erase(key).unwrap() {
            removed += 1;
        }
    }
    let hidden = positives.iter().filter(|&&k| !filter.contains(k)).count();
    assert!(hidden <= removed, "hidden {hidden} > removed {removed}");
}

#[test]
fn test_cuckoo_erase_everything() {
    // Colliding fingerprints in a shared bucket also share the alternate
    // bucket, so erasing every inserted key always succeeds and empties the table.
    let (positives, _) = make_disjoint_keys(5_000, 3);
    let mut filter = build_loaded(FilterKind::Cuckoo, positives.len(), 0.01, &positives);
    for &key in &positives {
        assert!(filter.erase(key).unwrap(), "lost {key}");
    }
    assert!(positives.iter().all(|&k| !filter.contains(k)));
}

#[test]
fn test_static_filters_reject_writes() {
    let mut bloom = build_loaded(FilterKind::BlockedBloom, 10, 0.01, &[1, 2, 3]);
    assert!(bloom.erase(1).is_err());
    let mut xor = build_loaded(FilterKind::Xor, 10, 0.01, &[1, 2, 3]);
    assert!(xor.insert(4).is_err());
    assert!(xor.erase(1).is_err());
}
