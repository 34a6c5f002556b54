// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Multiplexer configuration.

use xmbox_abi::constants::MAX_RING_ORDER;

/// Limits and scheduling quotas of a [`Multiplexer`](crate::Multiplexer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// Maximum number of channel and service routes.
    pub max_routes: usize,
    /// Largest data ring order a domain may open with.
    pub max_ring_order: u32,
    /// Detached slots examined per service pass.
    pub reap_quota: usize,
    /// Depth of queues behind local channels and service routes.
    pub queue_depth: usize,
    /// Frames forwarded per channel per service pass.
    pub pump_budget: usize,
    /// Processor id this side stamps on outgoing datagrams.
    pub local_origin: u8,
}

impl MuxConfig {
    /// Default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_routes: 32,
            max_ring_order: 12,
            reap_quota: 4,
            queue_depth: 16,
            pump_budget: 8,
            local_origin: 0,
        }
    }

    /// Set the route limit.
    #[must_use]
    pub const fn with_max_routes(mut self, max_routes: usize) -> Self {
        self.max_routes = max_routes;
        self
    }

    /// Set the largest accepted ring order (capped at the protocol maximum).
    #[must_use]
    pub const fn with_max_ring_order(mut self, order: u32) -> Self {
        self.max_ring_order = if order > MAX_RING_ORDER {
            MAX_RING_ORDER
        } else {
            order
        };
        self
    }

    /// Set the reap quota.
    #[must_use]
    pub const fn with_reap_quota(mut self, quota: usize) -> Self {
        self.reap_quota = quota;
        self
    }

    /// Set the local queue depth.
    #[must_use]
    pub const fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Set the per-channel pump budget.
    #[must_use]
    pub const fn with_pump_budget(mut self, frames: usize) -> Self {
        self.pump_budget = frames;
        self
    }

    /// Set the origin stamped on outgoing datagrams.
    #[must_use]
    pub const fn with_local_origin(mut self, origin: u8) -> Self {
        self.local_origin = origin;
        self
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self::new()
    }
}
