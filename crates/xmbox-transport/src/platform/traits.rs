// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform abstraction traits.

use alloc::sync::Arc;

/// Platform services needed by blocking transport operations.
///
/// This trait allows the command ring and channel adapter to wait for a peer
/// without knowing whether they run on bare metal, under a hypervisor, or in
/// a host test with a simulated clock.
pub trait Platform {
    /// Monotonic time in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Back off while waiting for a peer to make progress.
    ///
    /// On a cooperative scheduler this yields; on bare metal it may simply
    /// spin. Implementations must not block indefinitely.
    fn relax(&self);
}

impl<P: Platform + ?Sized> Platform for &P {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }

    fn relax(&self) {
        (**self).relax();
    }
}

impl<P: Platform + ?Sized> Platform for Arc<P> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }

    fn relax(&self) {
        (**self).relax();
    }
}

/// Notification path to the peer of a shared ring.
///
/// On real hardware this is an inter-domain event channel or a doorbell
/// register; the peer treats a ring as "maybe changed" when it fires.
pub trait Doorbell: Send + Sync {
    /// Notify the peer.
    fn ring(&self);
}

impl<F: Fn() + Send + Sync> Doorbell for F {
    fn ring(&self) {
        self();
    }
}

/// Doorbell that notifies nobody. For peers that poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDoorbell;

impl Doorbell for NullDoorbell {
    fn ring(&self) {}
}
