// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! ID types for processors, slots, domains and channels.

use core::fmt;

use crate::constants::{MAX_REMOTES, SLOTS_PER_REMOTE};

/// Identifier of a remote processor reachable through the slot hardware.
///
/// Remote processor ids are grid coordinates: they select a row of the
/// receive grid and a bit of a transmit target mask. Only ids below
/// [`MAX_REMOTES`] exist.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct RemoteProcessorId(u8);

impl RemoteProcessorId {
    /// Creates a remote processor id, rejecting ids the hardware cannot address.
    #[inline]
    #[must_use]
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < MAX_REMOTES {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns the id as a grid index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the single-bit transmit target mask for this processor.
    #[inline]
    #[must_use]
    pub const fn target_mask(self) -> u32 {
        1 << self.0
    }
}

impl fmt::Debug for RemoteProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteProcessorId({})", self.0)
    }
}

impl fmt::Display for RemoteProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu:{}", self.0)
    }
}

/// Index of a hardware message slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SlotId(u8);

impl SlotId {
    /// Creates a slot id, rejecting indices beyond the hardware slot count.
    #[inline]
    #[must_use]
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < SLOTS_PER_REMOTE {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns the slot index as a table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

/// Identifier of an isolated domain sharing the mailbox.
///
/// Domain ids are asserted by the hosting isolation layer when a domain's
/// command ring is attached; the transport never authenticates them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct DomainId(u8);

impl DomainId {
    /// Creates a new domain id.
    #[inline]
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Debug for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainId({})", self.0)
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dom:{}", self.0)
    }
}

/// Channel address local to one side of a conversation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct LocalAddress(u8);

impl LocalAddress {
    /// Creates a new local address.
    #[inline]
    #[must_use]
    pub const fn new(addr: u8) -> Self {
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Debug for LocalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalAddress({})", self.0)
    }
}

impl fmt::Display for LocalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr:{}", self.0)
    }
}

/// The far end of a channel: a remote processor and an address on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RemoteDescriptor {
    /// Processor hosting the remote endpoint.
    pub processor: RemoteProcessorId,
    /// Address of the endpoint on that processor.
    pub address: LocalAddress,
}

impl RemoteDescriptor {
    /// Creates a new remote descriptor.
    #[must_use]
    pub const fn new(processor: RemoteProcessorId, address: LocalAddress) -> Self {
        Self { processor, address }
    }
}

impl fmt::Display for RemoteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.processor, self.address)
    }
}

/// Correlation id of a command ring request.
///
/// Request ids are ring positions modulo the ring's slot count, so they are
/// only unique among calls outstanding at the same time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct RequestId(u32);

impl RequestId {
    /// Creates a new request id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Derives the request id for a ring position.
    ///
    /// `slot_count` must be a power of two.
    #[inline]
    #[must_use]
    pub const fn for_position(position: u32, slot_count: u32) -> Self {
        Self(position & (slot_count - 1))
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// Reference to a shared region granted by a domain to the privileged side.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct RingRef(u32);

impl RingRef {
    /// Creates a new ring reference.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw reference value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the reference as a table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for RingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingRef({})", self.0)
    }
}
