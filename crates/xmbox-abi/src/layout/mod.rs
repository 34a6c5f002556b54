// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Byte layouts of shared-memory headers and slot hardware registers.
//!
//! All shared header fields are `u32` in the platform's native endianness and
//! 4-byte aligned, so both sides can access them as atomic words.


/// Data ring shared header and byte regions.
///
/// ```text
/// +0   ring_order
/// +4   in_producer     +8  in_consumer     +12 in_error
/// +16  out_producer    +20 out_consumer    +24 out_error
/// +28  reserved
/// +32  in bytes  (2^order)
/// +32 + 2^order  out bytes (2^order)
/// ```
///
/// `in` carries bytes from the privileged side to the client,
/// `out` carries bytes from the client to the privileged side.
pub mod data_ring {
    /// Ring order (capacity = 2^order), published by the opening side.
    pub const RING_ORDER: usize = 0;
    /// Producer cursor of the `in` direction.
    pub const IN_PRODUCER: usize = 4;
    /// Consumer cursor of the `in` direction.
    pub const IN_CONSUMER: usize = 8;
    /// Fatal error flag of the `in` direction.
    pub const IN_ERROR: usize = 12;
    /// Producer cursor of the `out` direction.
    pub const OUT_PRODUCER: usize = 16;
    /// Consumer cursor of the `out` direction.
    pub const OUT_CONSUMER: usize = 20;
    /// Fatal error flag of the `out` direction.
    pub const OUT_ERROR: usize = 24;
    /// Size of the header, including padding.
    pub const HEADER_SIZE: usize = 32;

    /// Capacity of a ring of the given order.
    #[must_use]
    pub const fn capacity(order: u32) -> usize {
        1 << order
    }

    /// Offset of the `in` byte region.
    #[must_use]
    pub const fn in_offset() -> usize {
        HEADER_SIZE
    }

    /// Offset of the `out` byte region.
    #[must_use]
    pub const fn out_offset(order: u32) -> usize {
        HEADER_SIZE + capacity(order)
    }

    /// Total shared region size for a ring of the given order.
    #[must_use]
    pub const fn region_size(order: u32) -> usize {
        HEADER_SIZE + 2 * capacity(order)
    }
}

/// Command ring shared header and slot array.
///
/// ```text
/// +0   request_producer   +4  request_consumer
/// +8   response_producer  +12 response_consumer
/// +16  slot_count         +20 slot_size
/// +32  slot[0] .. slot[slot_count - 1]
/// ```
///
/// Requests and responses share slots: the responder overwrites the slot at
/// `response_producer % slot_count` with its response.
pub mod command_ring {
    /// Request producer cursor (written by the requester).
    pub const REQUEST_PRODUCER: usize = 0;
    /// Request consumer cursor (written by the responder).
    pub const REQUEST_CONSUMER: usize = 4;
    /// Response producer cursor (written by the responder).
    pub const RESPONSE_PRODUCER: usize = 8;
    /// Response consumer cursor (written by the requester).
    pub const RESPONSE_CONSUMER: usize = 12;
    /// Number of slots, a power of two.
    pub const SLOT_COUNT: usize = 16;
    /// Size of each slot in bytes.
    pub const SLOT_SIZE: usize = 20;
    /// Size of the header, including padding.
    pub const HEADER_SIZE: usize = 32;

    /// Offset of a slot's `request_id` field.
    pub const SLOT_REQUEST_ID: usize = 0;
    /// Offset of a slot's `command` field.
    pub const SLOT_COMMAND: usize = 4;
    /// Offset of a slot's `status` field (responses only).
    pub const SLOT_STATUS: usize = 8;
    /// Offset of a slot's `param_len` field.
    pub const SLOT_PARAM_LEN: usize = 12;
    /// Offset of a slot's parameter bytes.
    pub const SLOT_PARAMS: usize = 16;

    /// Offset of slot `index` within the region.
    #[must_use]
    pub const fn slot_offset(index: usize, slot_size: usize) -> usize {
        HEADER_SIZE + index * slot_size
    }

    /// Total shared region size for the given slot geometry.
    #[must_use]
    pub const fn region_size(slot_count: usize, slot_size: usize) -> usize {
        HEADER_SIZE + slot_count * slot_size
    }
}

/// Slot hardware register map.
///
/// ```text
/// 0x00000          RX_STATUS  (bit remote * 8 + slot = receive buffer valid)
/// 0x01000 + s*4K   TX slot s: META, CMD, STATUS, data window at +0x40
/// 0x10000 + i*4K   RX slot i = remote * 8 + slot: META, ACK, data window at +0x40
/// ```
pub mod regs {
    use crate::constants::{MAX_REMOTES, SLOTS_PER_REMOTE, WORD_SIZE};

    /// Global receive status bitmask.
    pub const RX_STATUS: usize = 0x0000;
    /// First transmit slot block.
    pub const TX_BASE: usize = 0x1000;
    /// Distance between transmit slot blocks.
    pub const TX_STRIDE: usize = 0x1000;
    /// First receive slot block.
    pub const RX_BASE: usize = 0x1_0000;
    /// Distance between receive slot blocks.
    pub const RX_STRIDE: usize = 0x1000;

    /// Transfer metadata register (TX and RX blocks).
    pub const META: usize = 0x00;
    /// Command register (TX blocks).
    pub const CMD: usize = 0x04;
    /// Status register (TX blocks).
    pub const STATUS: usize = 0x08;
    /// Acknowledge register (RX blocks).
    pub const ACK: usize = 0x04;
    /// Start of the data window.
    pub const DATA: usize = 0x40;

    /// `CMD` value that starts a transfer.
    pub const CMD_SEND: u32 = 1;
    /// `CMD` value that aborts a transfer.
    pub const CMD_CANCEL: u32 = 2;
    /// `STATUS` bit set while a transfer is in progress.
    pub const STATUS_BUSY: u32 = 1;
    /// `ACK` value that clears a receive buffer's valid bit.
    pub const ACK_CLEAR: u32 = 1;

    /// Size of the whole register window.
    pub const WINDOW_SIZE: usize = RX_BASE + MAX_REMOTES * SLOTS_PER_REMOTE * RX_STRIDE;

    /// Offset of transmit slot `slot`'s register block.
    #[must_use]
    pub const fn tx_block(slot: usize) -> usize {
        TX_BASE + slot * TX_STRIDE
    }

    /// Index of receive buffer `(remote, slot)` in the grid.
    #[must_use]
    pub const fn rx_index(remote: usize, slot: usize) -> usize {
        remote * SLOTS_PER_REMOTE + slot
    }

    /// Offset of receive buffer `(remote, slot)`'s register block.
    #[must_use]
    pub const fn rx_block(remote: usize, slot: usize) -> usize {
        RX_BASE + rx_index(remote, slot) * RX_STRIDE
    }

    /// Bit of [`RX_STATUS`] for receive buffer `(remote, slot)`.
    #[must_use]
    pub const fn rx_bit(remote: usize, slot: usize) -> u32 {
        1 << rx_index(remote, slot)
    }

    /// Decoded `META` register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SlotMeta {
        /// Transfer length in words.
        pub words: u16,
        /// Transmitting slot.
        pub slot: u8,
        /// Target processor mask.
        pub target_mask: u8,
        /// Unused bytes in the last word.
        pub pad: u8,
    }

    impl SlotMeta {
        const WORDS_MASK: u32 = 0x3FF;
        const SLOT_SHIFT: u32 = 12;
        const SLOT_MASK: u32 = 0xF;
        const TARGET_SHIFT: u32 = 16;
        const TARGET_MASK: u32 = 0xF;
        const PAD_SHIFT: u32 = 24;
        const PAD_MASK: u32 = 0x3;

        /// Builds the metadata for a payload of `len` bytes.
        ///
        /// The length is rounded up to whole words; the remainder is recorded
        /// as tail padding so the receiver can recover the exact length.
        #[must_use]
        pub const fn for_payload(len: usize, slot: u8, target_mask: u8) -> Self {
            let words = len.div_ceil(WORD_SIZE);
            Self {
                words: words as u16,
                slot,
                target_mask,
                pad: (words * WORD_SIZE - len) as u8,
            }
        }

        /// Encode into the raw register value.
        #[must_use]
        pub const fn encode(self) -> u32 {
            (self.words as u32 & Self::WORDS_MASK)
                | ((self.slot as u32 & Self::SLOT_MASK) << Self::SLOT_SHIFT)
                | ((self.target_mask as u32 & Self::TARGET_MASK) << Self::TARGET_SHIFT)
                | ((self.pad as u32 & Self::PAD_MASK) << Self::PAD_SHIFT)
        }

        /// Decode from a raw register value.
        #[must_use]
        pub const fn decode(raw: u32) -> Self {
            Self {
                words: (raw & Self::WORDS_MASK) as u16,
                slot: ((raw >> Self::SLOT_SHIFT) & Self::SLOT_MASK) as u8,
                target_mask: ((raw >> Self::TARGET_SHIFT) & Self::TARGET_MASK) as u8,
                pad: ((raw >> Self::PAD_SHIFT) & Self::PAD_MASK) as u8,
            }
        }

        /// Exact payload length in bytes.
        ///
        /// Returns `None` if the pad exceeds the transfer (malformed metadata).
        #[must_use]
        pub const fn byte_len(self) -> Option<usize> {
            (self.words as usize * WORD_SIZE).checked_sub(self.pad as usize)
        }
    }
}
