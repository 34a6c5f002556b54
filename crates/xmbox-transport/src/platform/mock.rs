// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock platform implementation for testing.
//!
//! `MockPlatform` has a manual clock that advances by a fixed step on every
//! `relax()`. Relax hooks stand in for the peer's scheduler: whenever the
//! code under test backs off, each hook runs once, so a single-threaded test
//! can drive both ends of a ring deterministically.

use std::boxed::Box;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::vec::Vec;

use super::{Doorbell, Platform};

/// Hook invoked on every `relax()`.
type RelaxHook = Box<dyn FnMut() + Send>;

/// Deterministic platform with a simulated clock.
pub struct MockPlatform {
    now: AtomicU64,
    step_ns: u64,
    relaxes: AtomicU64,
    hooks: spin::Mutex<Vec<RelaxHook>>,
}

impl MockPlatform {
    /// Default clock advance per `relax()` (1 µs).
    pub const DEFAULT_STEP_NS: u64 = 1_000;

    /// Create a mock platform at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_step(Self::DEFAULT_STEP_NS)
    }

    /// Create a mock platform advancing `step_ns` per `relax()`.
    #[must_use]
    pub fn with_step(step_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            step_ns,
            relaxes: AtomicU64::new(0),
            hooks: spin::Mutex::new(Vec::new()),
        }
    }

    /// Register a hook run on every `relax()`.
    ///
    /// Hooks must not call `relax()` on the same platform.
    pub fn on_relax(&self, hook: impl FnMut() + Send + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Move the clock forward without running hooks.
    pub fn advance(&self, ns: u64) {
        self.now.fetch_add(ns, Ordering::SeqCst);
    }

    /// Number of `relax()` calls so far.
    #[must_use]
    pub fn relax_count(&self) -> u64 {
        self.relaxes.load(Ordering::SeqCst)
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockPlatform {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn relax(&self) {
        self.now.fetch_add(self.step_ns, Ordering::SeqCst);
        self.relaxes.fetch_add(1, Ordering::SeqCst);
        for hook in self.hooks.lock().iter_mut() {
            hook();
        }
    }
}

/// Doorbell that counts how often it was rung.
#[derive(Debug, Default)]
pub struct CountingDoorbell {
    rings: AtomicUsize,
}

impl CountingDoorbell {
    /// Create a doorbell with a zero count.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rings: AtomicUsize::new(0),
        }
    }

    /// Number of rings so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rings.load(Ordering::SeqCst)
    }

    /// Return the count and reset it to zero.
    pub fn take(&self) -> usize {
        self.rings.swap(0, Ordering::SeqCst)
    }
}

impl Doorbell for CountingDoorbell {
    fn ring(&self) {
        self.rings.fetch_add(1, Ordering::SeqCst);
    }
}
