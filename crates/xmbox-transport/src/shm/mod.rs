// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared-memory arena used by both ring protocols.
//!
//! A [`SharedRegion`] is an opaque byte arena shared with another domain.
//! Header fields are accessed as atomic 32-bit words; payload bytes are
//! copied in and out by logical offset. No code outside this module touches
//! raw pointers into shared memory.

mod grant;
mod region;
mod window;


pub use grant::GrantTable;
pub use region::SharedRegion;
pub use window::RingWindow;
