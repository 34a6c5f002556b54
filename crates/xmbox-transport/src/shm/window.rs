// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Circular byte window addressed by unmasked cursor positions.

use super::SharedRegion;

/// A power-of-two byte window inside a [`SharedRegion`].
///
/// Positions are free-running `u32` cursors; the window masks them down to
/// an offset and splits any copy that crosses the end of the window into a
/// tail part and a head part. Because the capacity divides 2^32, masking stays
/// consistent when the cursor itself wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingWindow {
    offset: usize,
    capacity: usize,
}

impl RingWindow {
    /// Create a window of `capacity` bytes at `offset`.
    ///
    /// Returns `None` unless `capacity` is a non-zero power of two.
    #[must_use]
    pub const fn new(offset: usize, capacity: usize) -> Option<Self> {
        if capacity.is_power_of_two() {
            Some(Self { offset, capacity })
        } else {
            None
        }
    }

    /// Capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Split a transfer of `len` bytes at `position` into
    /// `(start_offset, first_len, second_len)`.
    #[must_use]
    pub const fn split(&self, position: u32, len: usize) -> (usize, usize, usize) {
        let start = position as usize & (self.capacity - 1);
        let until_end = self.capacity - start;
        if len <= until_end {
            (start, len, 0)
        } else {
            (start, until_end, len - until_end)
        }
    }

    /// Copy `src` into the window starting at `position`, wrapping at the end.
    ///
    /// `src` must not exceed the capacity.
    pub fn write(&self, region: &SharedRegion, position: u32, src: &[u8]) {
        debug_assert!(src.len() <= self.capacity);
        let (start, first, second) = self.split(position, src.len());
        let (tail, head) = src.split_at(first);
        region.copy_in(self.offset + start, tail);
        if second > 0 {
            region.copy_in(self.offset, head);
        }
    }

    /// Copy bytes starting at `position` into `dst`, wrapping at the end.
    ///
    /// `dst` must not exceed the capacity.
    pub fn read(&self, region: &SharedRegion, position: u32, dst: &mut [u8]) {
        debug_assert!(dst.len() <= self.capacity);
        let (start, first, second) = self.split(position, dst.len());
        let (tail, head) = dst.split_at_mut(first);
        region.copy_out(self.offset + start, tail);
        if second > 0 {
            region.copy_out(self.offset, head);
        }
    }
}
