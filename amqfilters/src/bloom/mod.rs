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

//! Blocked Bloom filter.
//!
//! A Bloom filter whose bit array is split into fixed-size blocks (512 bits by
//! default). One hash picks the block, a second hash drives `k` double-hashing
//! offsets inside it, so every lookup stays within a single cache line.
//!
//! # Usage
//!
//! ```rust
//! use amqfilters::bloom::BlockedBloomFilter;
//!
//! let mut filter = BlockedBloomFilter::builder()
//!     .with_accuracy(10_000, 0.01)
//!     .build()
//!     .unwrap();
//!
//! filter.insert(42).unwrap();
//! assert!(filter.contains(42));
//! ```
//!
//! # Notes
//!
//! - Bloom filters cannot erase; [`BlockedBloomFilter::erase`] always fails.
//! - The hash count `k` is derived from the target rate, never hand-tuned.

mod filter;

pub use self::filter::BlockedBloomFilter;
pub use self::filter::BlockedBloomFilterBuilder;
pub use self::filter::DEFAULT_BLOCK_BITS;
pub use self::filter::suggest_num_bits;
pub use self::filter::suggest_num_hashes;
