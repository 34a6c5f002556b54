// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Datagram header carried in front of every slot payload.
//!
//! # Wire Layout
//!
//! | Byte | Field |
//! |------|-------|
//! | 0 | `origin_processor` (remote processor id or domain id) |
//! | 1 | `source_address` |
//! | 2 | `destination_address` |
//! | 3 | `type` ([`DatagramKind`]) |
//! | 4.. | payload |
//!
//! The header carries no length: the slot hardware reports the transfer
//! length in whole words plus a tail pad count.

use core::fmt;

use crate::constants::{DATAGRAM_HEADER_SIZE, MAX_DATAGRAM_PAYLOAD};
use crate::types::LocalAddress;


/// Kind of a datagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DatagramKind {
    /// Application payload for a channel.
    Data = 0,
    /// Control traffic (low latency, usually early-acknowledged).
    Control = 1,
    /// Traffic from a system service that only identifies its processor.
    Service = 2,
}

impl DatagramKind {
    /// Try to convert from a raw byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Control),
            2 => Some(Self::Service),
            _ => None,
        }
    }
}

/// Header prefixed onto every slot payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatagramHeader {
    /// Sender's processor (hardware traffic) or domain (ring traffic).
    pub origin: u8,
    /// Address of the sending endpoint.
    pub source: LocalAddress,
    /// Address of the receiving endpoint.
    pub destination: LocalAddress,
    /// Datagram kind.
    pub kind: DatagramKind,
}

impl DatagramHeader {
    /// Size of the encoded header.
    pub const SIZE: usize = DATAGRAM_HEADER_SIZE;

    /// Creates a new header.
    #[must_use]
    pub const fn new(
        origin: u8,
        source: LocalAddress,
        destination: LocalAddress,
        kind: DatagramKind,
    ) -> Self {
        Self {
            origin,
            source,
            destination,
            kind,
        }
    }

    /// Encode the header into its four wire bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; DATAGRAM_HEADER_SIZE] {
        [
            self.origin,
            self.source.as_u8(),
            self.destination.as_u8(),
            self.kind as u8,
        ]
    }

    /// Decode a header from the front of a datagram.
    ///
    /// Returns `None` if the buffer is shorter than a header or the kind is unknown.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let &[origin, source, destination, kind, ..] = bytes else {
            return None;
        };
        Some(Self {
            origin,
            source: LocalAddress::new(source),
            destination: LocalAddress::new(destination),
            kind: DatagramKind::from_u8(kind)?,
        })
    }

    /// Splits a raw datagram into its header and payload.
    ///
    /// Returns `None` for malformed datagrams: too short, unknown kind, or a
    /// payload larger than any slot can carry.
    #[must_use]
    pub fn split(bytes: &[u8]) -> Option<(Self, &[u8])> {
        let header = Self::parse(bytes)?;
        let payload = bytes.get(DATAGRAM_HEADER_SIZE..)?;
        if payload.len() > MAX_DATAGRAM_PAYLOAD {
            return None;
        }
        Some((header, payload))
    }
}

impl fmt::Display for DatagramHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}:{} -> {}",
            self.kind, self.origin, self.source, self.destination
        )
    }
}
