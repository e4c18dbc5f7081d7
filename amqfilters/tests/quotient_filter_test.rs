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

use std::collections::HashMap;

use amqfilters::quotient::QuotientFilter;

fn small_filter() -> QuotientFilter {
    QuotientFilter::builder()
        .with_accuracy(16, 0.01)
        .build()
        .unwrap()
}

/// Finds three keys with the same home slot and distinct remainders.
fn three_keys_sharing_home() -> [u64; 3] {
    let layout = small_filter();
    let mut by_home: HashMap<usize, Vec<u64>> = HashMap::new();
    for key in 0..100_000u64 {
        let group = by_home.entry(layout.home_slot(key)).or_default();
        group.push(key);
        if group.len() == 3 {
            let candidate = [group[0], group[1], group[2]];
            let mut filter = small_filter();
            for key in candidate {
                filter.insert(key).unwrap();
            }
            if filter.occupied() == 3 {
                return candidate;
            }
            group.remove(0);
        }
    }
    panic!("no three keys share a home slot");
}

#[test]
fn test_tombstone_keeps_scan_chain() {
    let [a, b, c] = three_keys_sharing_home();
    let mut filter = small_filter();
    for key in [a, b, c] {
        filter.insert(key).unwrap();
    }

    assert_eq!(filter.erase(b), Ok(true));
    assert_eq!(filter.tombstones(), 1);
    assert!(filter.contains(a));
    assert!(filter.contains(c));
    assert!(!filter.contains(b));

    // the tombstone is reused by the next insert on the chain
    filter.insert(b).unwrap();
    assert_eq!(filter.tombstones(), 0);
    assert_eq!(filter.occupied(), 3);
    assert!(filter.contains(a) && filter.contains(b) && filter.contains(c));
}

#[test]
fn test_fill_to_capacity() {
    let mut filter = small_filter();
    let capacity = filter.capacity();
    let mut key = 0u64;
    while filter.occupied() < capacity {
        filter.insert(key).unwrap();
        key += 1;
    }
    assert_eq!(filter.load_factor(), 1.0);
    let stats = filter.cluster_stats();
    assert_eq!(stats.clusters, 1);
    assert_eq!(stats.max_len, capacity);
    assert!(filter.insert(u64::MAX).is_err() || filter.contains(u64::MAX));
}
