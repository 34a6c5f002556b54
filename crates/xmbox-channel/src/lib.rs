// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # xmbox channel adapter
//!
//! The client side of the xmbox mailbox, linked into every domain that
//! talks to remote processors through the privileged multiplexer.
//!
//! A [`Frontend`] owns the domain's command ring and the pool of granted
//! regions. [`Frontend::open`] turns one of those regions into a data ring,
//! asks the multiplexer to attach it, and hands back a [`Channel`]:
//!
//! - [`Channel::send`] frames a datagram into the ring, chunked when the
//!   ring is smaller than the frame
//! - [`Channel::poll_receive`] and [`Channel::recv`] reassemble inbound
//!   datagrams; [`Channel::dispatch_received`] feeds them to a callback
//! - [`Channel::close`] tears the channel down on both sides
//!
//! Callers only ever see [`OpenError`] and [`SendError`]; which ring or
//! which register failed stays internal.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod channel;
pub mod config;
pub mod error;
pub mod frontend;

#[cfg(test)]
mod fake_peer;

pub use channel::{Channel, ChannelState};
pub use config::ChannelConfig;
pub use error::{OpenError, SendError};
pub use frontend::Frontend;
