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

//! Cuckoo filter.
//!
//! Stores short fingerprints in buckets of a few slots. Every key has two
//! candidate buckets; inserting into a full pair displaces resident
//! fingerprints along a bounded chain of "kicks". A small stash absorbs the
//! rare insert that exhausts the chain.
//!
//! # Usage
//!
//! ```rust
//! use amqfilters::cuckoo::CuckooFilter;
//!
//! let mut filter = CuckooFilter::builder()
//!     .with_accuracy(10_000, 0.01)
//!     .build()
//!     .unwrap();
//!
//! filter.insert(7).unwrap();
//! assert!(filter.contains(7));
//! assert_eq!(filter.erase(7), Ok(true));
//! ```
//!
//! # Notes
//!
//! Erase removes a fingerprint, not a key. Erasing a key that was never
//! inserted can remove the fingerprint of a different key that collides with
//! it, which then reads as absent.

mod filter;

pub use self::filter::CuckooFilter;
pub use self::filter::CuckooFilterBuilder;
pub use self::filter::DEFAULT_BUCKET_SIZE;
pub use self::filter::DEFAULT_MAX_KICKS;
pub use self::filter::DEFAULT_STASH_CAPACITY;
