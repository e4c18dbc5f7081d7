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

//! The capability interface shared by all filters.

use std::fmt;

use crate::bloom::BlockedBloomFilter;
use crate::cuckoo::CuckooFilter;
use crate::error::OpError;
use crate::quotient::QuotientFilter;
use crate::xor::XorFilter;

/// Key type accepted by every filter.
pub type Key = u64;

/// An approximate membership query filter over [`Key`]s.
///
/// `contains` never reports a false negative for a key that was inserted and
/// not erased since; it may report false positives.
pub trait Filter {
    /// Adds `key` to the filter.
    ///
    /// # Errors
    ///
    /// - [`OpError::CapacityExhausted`] if the filter has no room for the key.
    ///   The filter stays usable; previously inserted keys remain present.
    /// - [`OpError::Unsupported`] for static filters.
    fn insert(&mut self, key: Key) -> Result<(), OpError>;

    /// Returns `true` if `key` is possibly in the set.
    fn contains(&self, key: Key) -> bool;

    /// Removes one entry matching `key`, returning whether a match was found.
    ///
    /// # Errors
    ///
    /// [`OpError::Unsupported`] for filters that cannot delete.
    fn erase(&mut self, key: Key) -> Result<bool, OpError>;

    /// Memory held by the filter's tables, in bytes.
    fn bytes_used(&self) -> usize;

    /// Which filter family this is.
    fn kind(&self) -> FilterKind;
}

/// The four filter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Blocked Bloom filter.
    BlockedBloom,
    /// Cuckoo filter with a stash.
    Cuckoo,
    /// Quotient filter with linear scanning and tombstones.
    Quotient,
    /// Static XOR filter.
    Xor,
}

impl FilterKind {
    /// All kinds, in report order.
    pub const ALL: [FilterKind; 4] = [
        FilterKind::BlockedBloom,
        FilterKind::Cuckoo,
        FilterKind::Quotient,
        FilterKind::Xor,
    ];

    /// Name used in reports.
    pub const fn name(self) -> &'static str {
        match self {
            FilterKind::BlockedBloom => "bloom_blocked",
            FilterKind::Cuckoo => "cuckoo",
            FilterKind::Quotient => "quotient",
            FilterKind::Xor => "xor",
        }
    }

    /// Whether the filter supports both insert and erase after construction.
    pub const fn is_dynamic(self) -> bool {
        matches!(self, FilterKind::Cuckoo | FilterKind::Quotient)
    }

    /// Whether the filter accepts inserts after construction.
    pub const fn accepts_inserts(self) -> bool {
        !matches!(self, FilterKind::Xor)
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A filter of any kind, for callers that pick the kind at runtime.
#[derive(Debug, Clone)]
pub enum AnyFilter {
    /// Blocked Bloom filter.
    BlockedBloom(BlockedBloomFilter),
    /// Cuckoo filter.
    Cuckoo(CuckooFilter),
    /// Quotient filter.
    Quotient(QuotientFilter),
    /// XOR filter.
    Xor(XorFilter),
}

macro_rules! dispatch {
    ($self:expr, $f:ident => $body:expr) => {
        match $self {
            AnyFilter::BlockedBloom($f) => $body,
            AnyFilter::Cuckoo($f) => $body,
            AnyFilter::Quotient($f) => $body,
            AnyFilter::Xor($f) => $body,
        }
    };
}

impl Filter for AnyFilter {
    fn insert(&mut self, key: Key) -> Result<(), OpError> {
        dispatch!(self, f => f.insert(key))
    }

    fn contains(&self, key: Key) -> bool {
        dispatch!(self, f => f.contains(key))
    }

    fn erase(&mut self, key: Key) -> Result<bool, OpError> {
        dispatch!(self, f => f.erase(key))
    }

    fn bytes_used(&self) -> usize {
        dispatch!(self, f => f.bytes_used())
    }

    fn kind(&self) -> FilterKind {
        dispatch!(self, f => f.kind())
    }
}

impl From<BlockedBloomFilter> for AnyFilter {
    fn from(f: BlockedBloomFilter) -> Self {
        AnyFilter::BlockedBloom(f)
    }
}

impl From<CuckooFilter> for AnyFilter {
    fn from(f: CuckooFilter) -> Self {
        AnyFilter::Cuckoo(f)
    }
}

impl From<QuotientFilter> for AnyFilter {
    fn from(f: QuotientFilter) -> Self {
        AnyFilter::Quotient(f)
    }
}

impl From<XorFilter> for AnyFilter {
    fn from(f: XorFilter) -> Self {
        AnyFilter::Xor(f)
    }
}
