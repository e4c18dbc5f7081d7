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

//! Quotient filter with linear scanning.
//!
//! Each key's hash is split into a quotient (the home slot) and a short
//! remainder (what gets stored). Lookups scan forward from the home slot
//! until they hit an empty slot.
//!
//! ```rust
//! use amqfilters::quotient::QuotientFilter;
//!
//! let mut filter = QuotientFilter::builder()
//!     .with_accuracy(10_000, 0.01)
//!     .build()
//!     .unwrap();
//!
//! filter.insert(3).unwrap();
//! assert!(filter.contains(3));
//! assert_eq!(filter.erase(3), Ok(true));
//! assert_eq!(filter.tombstones(), 1);
//! ```

mod filter;

pub use self::filter::ClusterStats;
pub use self::filter::QuotientFilter;
pub use self::filter::QuotientFilterBuilder;
