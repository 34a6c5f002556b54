// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Ring transport errors.

use core::fmt;

/// Errors on a data ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Cursor skew or framing violated the protocol. The ring is now faulted.
    Protocol,
    /// The peer flagged the ring as dead.
    PeerFault,
    /// The published ring order exceeds what this side accepts.
    OrderTooLarge {
        /// Order found in the header.
        requested: u32,
        /// Largest order accepted.
        max: u32,
    },
    /// The shared region cannot hold a ring of the requested order.
    RegionTooSmall,
    /// Header fields describe an impossible geometry.
    BadLayout,
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol => write!(f, "ring protocol violation"),
            Self::PeerFault => write!(f, "ring faulted by peer"),
            Self::OrderTooLarge { requested, max } => {
                write!(f, "ring order {requested} exceeds maximum {max}")
            }
            Self::RegionTooSmall => write!(f, "shared region too small"),
            Self::BadLayout => write!(f, "invalid ring layout"),
        }
    }
}

/// Errors of a command ring call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// Every request slot is occupied.
    Full,
    /// No response before the deadline. The peer may still act on the request.
    Timeout,
    /// The ring's shared header is corrupt.
    Fault,
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "command ring full"),
            Self::Timeout => write!(f, "command timed out"),
            Self::Fault => write!(f, "command ring fault"),
        }
    }
}
