// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # xmbox transport
//!
//! Mechanisms shared by both sides of the xmbox mailbox.
//!
//! This crate provides:
//! - The message-slot engine driving the physical mailbox hardware
//! - The command ring (slotted request/response RPC over shared memory)
//! - The data ring (byte stream with producer/consumer cursors)
//! - Bounded queues handing inbound datagrams to their owning tasks
//! - Platform seams (clock, doorbells, interrupt masking) with host mocks
//!
//! Nothing in here knows about domains or routing; that lives in
//! `xmbox-mux` (privileged side) and `xmbox-channel` (client side).

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod platform;
pub mod queue;
pub mod ring;
pub mod shm;
pub mod slot;
pub mod sync;


// Re-export commonly used types at crate root
pub use platform::{Doorbell, Platform};
pub use queue::{QueueFull, QueueReceiver, QueueSender, bounded};
pub use ring::{
    CallError, CommandClient, CommandRingLayout, CommandServer, DataRing, FrameAssembler,
    PendingCall, RingError, Side,
};
pub use shm::{GrantTable, RingWindow, SharedRegion};
pub use slot::{Inbound, MailboxRegs, SlotEngine, SlotEngineConfig, SlotError, SlotHandle};
pub use sync::IrqMutex;

/// Stack version for runtime queries.
///
/// A release build may stamp a git-derived version through `XMBOX_VERSION`;
/// otherwise this is the crate's package version.
pub const VERSION: &str = match option_env!("XMBOX_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
