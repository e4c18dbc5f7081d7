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

//! Approximate membership query filters and a harness for benchmarking them.
//!
//! Four filter families share the [`filter::Filter`] interface:
//!
//! - [`bloom::BlockedBloomFilter`]: insert-only, cache-line blocked Bloom filter.
//! - [`cuckoo::CuckooFilter`]: fingerprints in two-choice buckets with a stash; supports erase.
//! - [`quotient::QuotientFilter`]: open-addressed quotient/remainder table; supports erase.
//! - [`xor::XorFilter`]: static filter built once from a known key set.
//!
//! [`workload`] generates reproducible key sets and operation streams,
//! [`harness`] times them against a filter, and [`experiment`] composes both
//! into sweeps that yield serialisable records.
//!
//! # Usage
//!
//! ```rust
//! use amqfilters::harness::measure_false_positive_rate;
//! use amqfilters::quotient::QuotientFilter;
//! use amqfilters::workload::make_disjoint_keys;
//!
//! let (positives, negatives) = make_disjoint_keys(10_000, 1);
//! let mut filter = QuotientFilter::builder()
//!     .with_accuracy(10_000, 0.01)
//!     .build()
//!     .unwrap();
//! for &key in &positives {
//!     filter.insert(key).unwrap();
//! }
//! assert!(positives.iter().all(|&k| filter.contains(k)));
//! assert!(measure_false_positive_rate(&filter, &negatives) < 0.03);
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod bloom;
pub mod cuckoo;
pub mod error;
pub mod experiment;
pub mod filter;
pub mod harness;
pub mod hash;
pub mod quotient;
pub mod workload;
pub mod xor;
