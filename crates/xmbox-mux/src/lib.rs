// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # xmbox multiplexer
//!
//! The privileged side of the xmbox mailbox. It owns the one physical
//! message-slot engine and fans it out to every attached domain:
//!
//! - [`RoutingTable`]: `(domain, address)` pairs mapped to live channels,
//!   plus processor-level service routes
//! - [`Multiplexer`]: answers each domain's command ring, moves frames
//!   between data rings and the slot engine, and schedules slot reaping
//!
//! The multiplexer is an explicit object owned by whoever hosts it. Nothing
//! here lives in a static.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod config;
pub mod mux;
pub mod routing;

pub use config::MuxConfig;
pub use mux::{MuxError, MuxStats, Multiplexer, ServiceReport};
pub use routing::{RouteError, RouteOutcome, RoutingTable, Sink};
