// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Ring protocols over shared memory.
//!
//! - [`CommandClient`] / [`CommandServer`]: fixed-size slotted request/response RPC
//! - [`DataRing`]: two independent byte streams with producer/consumer cursors
//! - [`FrameAssembler`]: length-prefixed datagram framing on top of a data ring
//!
//! Each side writes exactly one cursor of every pair and only reads the
//! other. Payload bytes are published with a release store of the cursor
//! and observed through an acquire load, so no lock is shared between domains.

mod command;
mod data;
mod error;
mod frame;
mod pending;

#[cfg(test)]
mod data_test;
#[cfg(test)]
mod frame_test;
#[cfg(test)]
mod pending_test;

pub use command::{CommandClient, CommandRingLayout, CommandServer};
pub use data::{DataRing, Side};
pub use error::{CallError, RingError};
pub use frame::{FrameAssembler, encode_prefix};
pub use pending::{PendingCall, PendingList};
