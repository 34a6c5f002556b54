// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Slot engine errors.

use core::fmt;

use xmbox_abi::SlotId;

/// Errors returned by the slot engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// Every transmit slot is owned. Retry later.
    Busy,
    /// The slot's control register did not read back what was written.
    /// The slot has been freed and the handle is stale.
    HwFault(SlotId),
    /// Payload exceeds the slot's data window.
    TooLarge,
    /// Target processor is not attached to this engine.
    InvalidRemote,
    /// The handle refers to an earlier owner of the slot.
    Stale,
    /// A transfer on this slot has not finished yet.
    InFlight,
    /// A local endpoint with this address is already registered.
    AddressInUse,
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "no free transmit slot"),
            Self::HwFault(slot) => write!(f, "hardware fault on {slot}"),
            Self::TooLarge => write!(f, "payload exceeds slot window"),
            Self::InvalidRemote => write!(f, "unknown remote processor"),
            Self::Stale => write!(f, "stale slot handle"),
            Self::InFlight => write!(f, "transfer still in flight"),
            Self::AddressInUse => write!(f, "endpoint address in use"),
        }
    }
}
