// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Regions a domain has granted to the privileged side.

use alloc::sync::Arc;
use alloc::vec::Vec;

use xmbox_abi::RingRef;

use super::SharedRegion;

/// Table of shared regions indexed by [`RingRef`].
///
/// The hosting isolation layer establishes the table when a domain is
/// attached; both the domain and the privileged side hold a view of it.
/// References arrive from the untrusted side, so lookups are checked.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    regions: Vec<Arc<SharedRegion>>,
}

impl GrantTable {
    /// Create a table from already shared regions.
    #[must_use]
    pub const fn new(regions: Vec<Arc<SharedRegion>>) -> Self {
        Self { regions }
    }

    /// Create a table of `count` fresh heap-backed regions of `len` bytes each.
    #[must_use]
    pub fn with_regions(count: usize, len: usize) -> Self {
        Self {
            regions: (0..count)
                .map(|_| Arc::new(SharedRegion::new_zeroed(len)))
                .collect(),
        }
    }

    /// Look up a granted region.
    #[must_use]
    pub fn get(&self, ring_ref: RingRef) -> Option<Arc<SharedRegion>> {
        self.regions.get(ring_ref.index()).cloned()
    }

    /// All references in the table.
    pub fn refs(&self) -> impl Iterator<Item = RingRef> + '_ {
        (0..self.regions.len()).filter_map(|index| u32::try_from(index).ok().map(RingRef::new))
    }

    /// Number of granted regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if nothing was granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
