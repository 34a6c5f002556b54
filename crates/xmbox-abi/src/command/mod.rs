// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Command ring messages between a domain and the privileged multiplexer.
//!
//! Commands travel in fixed-size slots of a command ring. Each slot carries a
//! small fixed header and an opaque parameter block; this module defines the
//! typed views of those parameter blocks.
//!
//! # Parameter Layouts
//!
//! ## `OpenRequest` (domain → multiplexer):
//!
//! | Byte | Content |
//! |------|---------|
//! | 0 | `local_address` |
//! | 1 | `remote_processor` |
//! | 2 | `remote_address` |
//! | 3 | `ring_order` |
//! | 4..8 | `ring_ref` (u32, native endian) |
//!
//! ## `OpenResponse` (multiplexer → domain):
//!
//! | Byte | Content |
//! |------|---------|
//! | 0..4 | `max_payload` (u32, native endian) |
//!
//! ## `CloseRequest` (domain → multiplexer):
//!
//! | Byte | Content |
//! |------|---------|
//! | 0 | `local_address` |

use core::fmt;

use crate::constants::MAX_PARAM_SIZE;
use crate::types::{LocalAddress, RemoteDescriptor, RemoteProcessorId, RingRef};

#[cfg(test)]
mod command_test;

// =============================================================================
// Command and Result Codes
// =============================================================================

/// Command carried by a command ring request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandKind {
    /// Open a channel and attach its data ring.
    OpenChannel = 1,
    /// Close a channel and release its routing entry.
    CloseChannel = 2,
}

impl CommandKind {
    /// Try to convert from a raw u32 value.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::OpenChannel),
            2 => Some(Self::CloseChannel),
            _ => None,
        }
    }
}

/// Typed result code written back in a command response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ResultCode {
    /// Command succeeded.
    Ok = 0,
    /// A routing entry for this `(domain, address)` pair already exists.
    AlreadyExists = 1,
    /// No routing entry matched.
    NotFound = 2,
    /// The multiplexer refused the request (bad ring reference, ring too large).
    Rejected = 3,
    /// The multiplexer is out of routing resources.
    Busy = 4,
    /// The command or its parameters could not be decoded.
    Invalid = 5,
}

impl ResultCode {
    /// Try to convert from a raw u32 value.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::AlreadyExists),
            2 => Some(Self::NotFound),
            3 => Some(Self::Rejected),
            4 => Some(Self::Busy),
            5 => Some(Self::Invalid),
            _ => None,
        }
    }

    /// Returns true if this is a success code.
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::NotFound => write!(f, "not found"),
            Self::Rejected => write!(f, "rejected"),
            Self::Busy => write!(f, "busy"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

// =============================================================================
// Parameter Block
// =============================================================================

/// Opaque, length-prefixed parameter block of a command slot.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ParamBlock {
    len: u8,
    bytes: [u8; MAX_PARAM_SIZE],
}

impl ParamBlock {
    /// An empty parameter block.
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [0; MAX_PARAM_SIZE],
    };

    /// Creates a parameter block from raw bytes.
    ///
    /// Returns `None` if `bytes` exceeds [`MAX_PARAM_SIZE`].
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_PARAM_SIZE {
            return None;
        }
        let mut block = Self::EMPTY;
        block.bytes[..bytes.len()].copy_from_slice(bytes);
        block.len = u8::try_from(bytes.len()).ok()?;
        Some(block)
    }

    /// Returns the used bytes of the block.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Returns the number of used bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns true if the block carries no parameters.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ParamBlock {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for ParamBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamBlock({:02x?})", self.as_slice())
    }
}

// =============================================================================
// Request/Response Structures
// =============================================================================

/// A command ring request: a command plus its parameter block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    /// Command to execute.
    pub command: CommandKind,
    /// Command parameters.
    pub params: ParamBlock,
}

/// A command ring response: a result code plus a parameter block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response {
    /// Outcome of the command.
    pub status: ResultCode,
    /// Response parameters (only meaningful on success).
    pub params: ParamBlock,
}

impl Response {
    /// Creates a response with no parameters.
    #[must_use]
    pub const fn status(status: ResultCode) -> Self {
        Self {
            status,
            params: ParamBlock::EMPTY,
        }
    }
}

/// Request to open a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    /// Address of the channel on the requesting domain.
    pub local_address: LocalAddress,
    /// Far end of the channel.
    pub remote: RemoteDescriptor,
    /// Order of the data ring the domain prepared (capacity = 2^order).
    pub ring_order: u8,
    /// Grant reference of the data ring's shared region.
    pub ring_ref: RingRef,
}

impl OpenRequest {
    const ENCODED_LEN: usize = 8;

    /// Encode this request into a command ring request.
    #[must_use]
    pub fn to_request(self) -> Request {
        let mut raw = [0u8; Self::ENCODED_LEN];
        raw[0] = self.local_address.as_u8();
        raw[1] = self.remote.processor.as_u8();
        raw[2] = self.remote.address.as_u8();
        raw[3] = self.ring_order;
        raw[4..8].copy_from_slice(&self.ring_ref.as_u32().to_ne_bytes());
        Request {
            command: CommandKind::OpenChannel,
            params: ParamBlock::from_slice(&raw).unwrap_or(ParamBlock::EMPTY),
        }
    }

    /// Decode an open request from its parameter block.
    ///
    /// Returns `None` if the block is too short or names an unknown processor.
    #[must_use]
    pub fn from_params(params: &ParamBlock) -> Option<Self> {
        let raw = params.as_slice();
        let &[local, processor, remote_address, ring_order, r0, r1, r2, r3, ..] = raw else {
            return None;
        };
        Some(Self {
            local_address: LocalAddress::new(local),
            remote: RemoteDescriptor::new(
                RemoteProcessorId::new(processor)?,
                LocalAddress::new(remote_address),
            ),
            ring_order,
            ring_ref: RingRef::new(u32::from_ne_bytes([r0, r1, r2, r3])),
        })
    }
}

/// Successful reply to an [`OpenRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenResponse {
    /// Largest datagram payload the channel accepts.
    pub max_payload: u32,
}

impl OpenResponse {
    /// Encode this reply into a successful command ring response.
    #[must_use]
    pub fn to_response(self) -> Response {
        Response {
            status: ResultCode::Ok,
            params: ParamBlock::from_slice(&self.max_payload.to_ne_bytes())
                .unwrap_or(ParamBlock::EMPTY),
        }
    }

    /// Decode an open reply from a response's parameter block.
    #[must_use]
    pub fn from_params(params: &ParamBlock) -> Option<Self> {
        let &[b0, b1, b2, b3, ..] = params.as_slice() else {
            return None;
        };
        Some(Self {
            max_payload: u32::from_ne_bytes([b0, b1, b2, b3]),
        })
    }
}

/// Request to close a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloseRequest {
    /// Address of the channel on the requesting domain.
    pub local_address: LocalAddress,
}

impl CloseRequest {
    /// Encode this request into a command ring request.
    #[must_use]
    pub fn to_request(self) -> Request {
        Request {
            command: CommandKind::CloseChannel,
            params: ParamBlock::from_slice(&[self.local_address.as_u8()])
                .unwrap_or(ParamBlock::EMPTY),
        }
    }

    /// Decode a close request from its parameter block.
    #[must_use]
    pub fn from_params(params: &ParamBlock) -> Option<Self> {
        let &[local, ..] = params.as_slice() else {
            return None;
        };
        Some(Self {
            local_address: LocalAddress::new(local),
        })
    }
}
