// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Channel adapter configuration.

use xmbox_abi::constants::{MAX_RING_ORDER, MIN_RING_ORDER};

/// Timeouts, spin budgets and ring geometry of a [`Frontend`](crate::Frontend).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Deadline of an open request.
    pub open_timeout_ns: u64,
    /// Deadline of a close request.
    pub close_timeout_ns: u64,
    /// Consecutive empty writes tolerated before `send` gives up.
    pub send_spin_budget: usize,
    /// Order of data rings created for new channels (capacity is `2^order`).
    pub ring_order: u32,
}

impl ChannelConfig {
    /// Default configuration: 100 ms open, 50 ms close, 4 KiB rings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            open_timeout_ns: 100_000_000,
            close_timeout_ns: 50_000_000,
            send_spin_budget: 64,
            ring_order: 12,
        }
    }

    /// Set the open deadline.
    #[must_use]
    pub const fn with_open_timeout_ns(mut self, ns: u64) -> Self {
        self.open_timeout_ns = ns;
        self
    }

    /// Set the close deadline.
    #[must_use]
    pub const fn with_close_timeout_ns(mut self, ns: u64) -> Self {
        self.close_timeout_ns = ns;
        self
    }

    /// Set the send spin budget.
    #[must_use]
    pub const fn with_send_spin_budget(mut self, spins: usize) -> Self {
        self.send_spin_budget = spins;
        self
    }

    /// Set the data ring order, clamped to the protocol limits.
    #[must_use]
    pub const fn with_ring_order(mut self, order: u32) -> Self {
        self.ring_order = if order < MIN_RING_ORDER {
            MIN_RING_ORDER
        } else if order > MAX_RING_ORDER {
            MAX_RING_ORDER
        } else {
            order
        };
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}
