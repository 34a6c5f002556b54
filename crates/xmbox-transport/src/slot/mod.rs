// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Message-slot engine.
//!
//! The mailbox hardware exposes a fixed pool of transmit slots shared by
//! every local sender, and a receive grid with one buffer per
//! `(remote processor, slot)` pair. This module serializes slot ownership,
//! drives transfers, reclaims finished sends, and demultiplexes receive
//! interrupts into per-endpoint queues.

mod engine;
mod error;
mod hw;
#[cfg(any(test, feature = "std"))]
mod mock;

#[cfg(test)]
mod engine_test;

pub use engine::{EngineStats, Inbound, SlotEngine, SlotEngineConfig, SlotHandle};
pub use error::SlotError;
pub use hw::{MailboxRegs, MmioMailbox};
#[cfg(any(test, feature = "std"))]
pub use mock::{MockMailbox, SentFrame};
