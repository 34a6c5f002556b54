// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Identifier types shared by every xmbox party.
//!
//! All identifiers are small `#[repr(transparent)]` newtypes so they can be
//! embedded in wire headers without conversion cost while still keeping
//! processor ids, slot ids and addresses from being mixed up.

mod id;


pub use id::{DomainId, LocalAddress, RemoteDescriptor, RemoteProcessorId, RequestId, RingRef, SlotId};
