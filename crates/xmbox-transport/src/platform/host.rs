// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host platform backed by the standard library.

use std::time::Instant;

use super::Platform;

/// Platform using the host's monotonic clock and thread scheduler.
#[derive(Debug, Clone, Copy)]
pub struct StdPlatform {
    epoch: Instant,
}

impl StdPlatform {
    /// Create a platform whose clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StdPlatform {
    fn now_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn relax(&self) {
        std::thread::yield_now();
    }
}
