// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The shared byte arena.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A block of memory shared between two domains.
///
/// Offsets are byte offsets from the start of the region. Word accessors
/// require 4-byte aligned offsets; violating alignment or bounds is a bug in
/// the caller's layout arithmetic and panics.
pub struct SharedRegion {
    base: NonNull<u8>,
    len: usize,
    /// Leaked backing store of heap regions, rebuilt into a box on drop.
    /// `None` for externally mapped memory.
    heap: Option<NonNull<[AtomicU64]>>,
}

// SAFETY: all header access goes through atomics. Payload bytes are
// partitioned by the ring protocols: a byte range is only written by its
// producer while it lies outside [consumer, producer), and only read by its
// consumer while it lies inside, with acquire/release on the cursors
// ordering the copies.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Allocate a zeroed, heap-backed region of at least `len` bytes.
    ///
    /// The backing store is 8-byte aligned; `len` is rounded up to a multiple of 8.
    #[must_use]
    pub fn new_zeroed(len: usize) -> Self {
        let words = len.div_ceil(8).max(1);
        let backing: Box<[AtomicU64]> = (0..words)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        // Derived from the whole slice, so every byte offset stays in bounds
        // of the pointer's provenance
        let heap = NonNull::from(Box::leak(backing));
        Self {
            base: heap.cast::<u8>(),
            len: words * 8,
            heap: Some(heap),
        }
    }

    /// Wrap memory mapped from another domain.
    ///
    /// # Safety
    ///
    /// `base` must be 4-byte aligned and valid for reads and writes of `len`
    /// bytes for the lifetime of the region, and only accessed by the peer
    /// under the same ring protocols.
    #[must_use]
    pub const unsafe fn from_raw(base: NonNull<u8>, len: usize) -> Self {
        Self {
            base,
            len,
            heap: None,
        }
    }

    /// Size of the region in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true for a zero-sized region.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[expect(
        clippy::panic,
        reason = "out-of-layout access is a programming error, not a peer fault"
    )]
    fn word(&self, offset: usize) -> &AtomicU32 {
        assert!(
            offset % 4 == 0 && offset.checked_add(4).is_some_and(|end| end <= self.len),
            "word access at {offset} outside region of {} bytes",
            self.len
        );
        // SAFETY: in bounds and 4-byte aligned (base is at least 4-aligned);
        // AtomicU32 has the same layout as u32.
        unsafe { &*self.base.as_ptr().add(offset).cast::<AtomicU32>() }
    }

    /// Load a header word with acquire ordering.
    #[must_use]
    pub fn load_u32(&self, offset: usize) -> u32 {
        self.word(offset).load(Ordering::Acquire)
    }

    /// Store a header word with release ordering.
    pub fn store_u32(&self, offset: usize, value: u32) {
        self.word(offset).store(value, Ordering::Release);
    }

    fn check_range(&self, offset: usize, len: usize) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            "byte range {offset}+{len} outside region of {} bytes",
            self.len
        );
    }

    /// Copy `src` into the region at `offset`.
    pub fn copy_in(&self, offset: usize, src: &[u8]) {
        self.check_range(offset, src.len());
        // SAFETY: range checked above; the ring protocol guarantees the peer
        // is not accessing these bytes concurrently.
        unsafe {
            core::ptr::copy_nonoverlapping(
                src.as_ptr(),
                self.base.as_ptr().add(offset),
                src.len(),
            );
        }
    }

    /// Copy bytes at `offset` out of the region into `dst`.
    pub fn copy_out(&self, offset: usize, dst: &mut [u8]) {
        self.check_range(offset, dst.len());
        // SAFETY: range checked above; see `copy_in`.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(offset),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
    }

    /// Zero `len` bytes starting at `offset`.
    pub fn zero(&self, offset: usize, len: usize) {
        self.check_range(offset, len);
        // SAFETY: range checked above; only used while initializing a ring.
        unsafe {
            core::ptr::write_bytes(self.base.as_ptr().add(offset), 0, len);
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Some(heap) = self.heap.take() {
            // SAFETY: `heap` was leaked from a boxed slice in `new_zeroed`
            // and nothing else frees it.
            drop(unsafe { Box::from_raw(heap.as_ptr()) });
        }
    }
}

impl core::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("base", &self.base)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
