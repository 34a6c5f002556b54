// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared ABI definitions for the xmbox mailbox transport.
//!
//! This crate defines the contract between every party touching the
//! mailbox: the privileged multiplexer, the client domains, and the
//! remote processors behind the slot hardware.
//! - Identifier types for processors, slots, domains and addresses
//! - The datagram header prefixed onto every slot payload
//! - Command ring request/response encoding and result codes
//! - Shared-memory and register layout constants
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data types, 100% host-testable
//! - **Native endian**: Shared headers are read by peers on the same `SoC`
//! - **Explicit decoding**: Every `from_*` returns `Option` and rejects junk
//!
//! # Modules
//!
//! - [`types`]: ID newtypes (`RemoteProcessorId`, `SlotId`, `DomainId`, ...)
//! - [`datagram`]: Datagram header and kinds
//! - [`command`]: Command ring messages
//! - [`layout`]: Byte offsets of shared headers and hardware registers
//! - [`constants`]: Protocol and hardware limits

#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod constants;
pub mod datagram;
pub mod layout;
pub mod types;

// Re-export commonly used types at crate root
pub use command::{
    CloseRequest, CommandKind, OpenRequest, OpenResponse, ParamBlock, Request, Response, ResultCode,
};
pub use datagram::{DatagramHeader, DatagramKind};
pub use types::{
    DomainId, LocalAddress, RemoteDescriptor, RemoteProcessorId, RequestId, RingRef, SlotId,
};
