// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Protocol and hardware limits.

/// Number of remote processors the slot hardware can address.
pub const MAX_REMOTES: usize = 4;

/// Number of transmit slots implemented by the hardware.
///
/// The receive grid mirrors this: every remote owns one receive buffer per slot.
pub const SLOTS_PER_REMOTE: usize = 8;

/// Hardware word size. Slot payloads are transferred in whole words.
pub const WORD_SIZE: usize = 4;

/// Size of a slot's data window in bytes.
pub const SLOT_BUFFER_SIZE: usize = 2048;

/// Size of the datagram header prefixed onto every slot payload.
pub const DATAGRAM_HEADER_SIZE: usize = 4;

/// Largest payload a single datagram can carry.
pub const MAX_DATAGRAM_PAYLOAD: usize = SLOT_BUFFER_SIZE - DATAGRAM_HEADER_SIZE;

/// Smallest data ring order accepted (64-byte rings).
pub const MIN_RING_ORDER: u32 = 6;

/// Largest data ring order any side will ever accept (1 MiB rings).
///
/// The privileged side usually enforces a tighter bound from its config.
pub const MAX_RING_ORDER: u32 = 20;

/// Size of the stream framing prefix on data rings.
pub const FRAME_PREFIX_SIZE: usize = 2;

/// Command ring slot size used by default.
pub const COMMAND_SLOT_SIZE: u32 = 64;

/// Command ring slot count used by default.
pub const COMMAND_SLOT_COUNT: u32 = 8;

/// Fixed per-slot header in the command ring (`request_id`, `command`, `status`, `param_len`).
pub const COMMAND_SLOT_HEADER_SIZE: usize = 16;

/// Maximum size of an opaque command parameter block.
pub const MAX_PARAM_SIZE: usize = 48;

// Compile-time sanity checks on the hardware geometry
const _: () = assert!(MAX_REMOTES * SLOTS_PER_REMOTE <= 32);
const _: () = assert!(SLOT_BUFFER_SIZE % WORD_SIZE == 0);
const _: () = assert!(MAX_DATAGRAM_PAYLOAD <= u16::MAX as usize);
const _: () = assert!(COMMAND_SLOT_HEADER_SIZE + MAX_PARAM_SIZE == COMMAND_SLOT_SIZE as usize);
