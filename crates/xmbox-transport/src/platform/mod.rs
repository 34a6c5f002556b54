// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform abstraction for the transport.
//!
//! The transport only needs three things from its environment: a monotonic
//! clock, a way to back off while waiting on a peer, and doorbells that
//! notify the peer of new ring contents. Everything else is shared memory
//! and slot registers.


// Host implementations require std
#[cfg(any(test, feature = "std"))]
mod host;
#[cfg(any(test, feature = "std"))]
mod mock;
mod traits;

#[cfg(any(test, feature = "std"))]
pub use host::StdPlatform;
#[cfg(any(test, feature = "std"))]
pub use mock::{CountingDoorbell, MockPlatform};
pub use traits::{Doorbell, NullDoorbell, Platform};
