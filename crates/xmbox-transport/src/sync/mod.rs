// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Synchronization primitives for the transport.
//!
//! The slot engine's receive path runs in interrupt context while the send
//! path runs in task context, possibly on another core. Shared slot state is
//! therefore guarded by a lock that also masks local interrupts.

mod irq_mutex;

#[cfg(test)]
mod irq_mutex_test;

pub use irq_mutex::{IrqControl, IrqMutex, IrqMutexGuard, NoIrq};

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use irq_mutex::Daif;
