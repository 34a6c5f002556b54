// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Datagram framing on top of a data ring.
//!
//! The data ring is a plain byte stream. Datagrams travel as a native-endian
//! `u16` length followed by that many bytes. A frame may be larger than the
//! ring itself, so the reader reassembles the body incrementally instead of
//! waiting for the whole record to be queued.

use alloc::vec;
use alloc::vec::Vec;

use tracing::warn;
use xmbox_abi::constants::FRAME_PREFIX_SIZE;

use super::{DataRing, RingError};

/// Length prefix for a frame of `len` bytes, or `None` if it cannot be framed.
#[must_use]
pub fn encode_prefix(len: usize) -> Option<[u8; FRAME_PREFIX_SIZE]> {
    u16::try_from(len).ok().map(u16::to_ne_bytes)
}

struct Partial {
    body: Vec<u8>,
    filled: usize,
}

/// Incremental frame reader for one ring direction.
pub struct FrameAssembler {
    max_len: usize,
    partial: Option<Partial>,
}

impl FrameAssembler {
    /// Create an assembler rejecting frames longer than `max_len`.
    #[must_use]
    pub const fn new(max_len: usize) -> Self {
        Self {
            max_len,
            partial: None,
        }
    }

    /// Returns true while a frame is half read.
    #[must_use]
    pub const fn in_progress(&self) -> bool {
        self.partial.is_some()
    }

    /// Pull bytes from `ring` until one frame is complete or the ring runs dry.
    ///
    /// Returns `Ok(None)` if no complete frame is available yet. A length
    /// prefix above the limit faults the ring.
    pub fn pump(&mut self, ring: &mut DataRing) -> Result<Option<Vec<u8>>, RingError> {
        let mut partial = match self.partial.take() {
            Some(partial) => partial,
            None => {
                let mut prefix = [0u8; FRAME_PREFIX_SIZE];
                if ring.read(&mut prefix, true)? < FRAME_PREFIX_SIZE {
                    return Ok(None);
                }
                ring.read(&mut prefix, false)?;
                let len = usize::from(u16::from_ne_bytes(prefix));
                if len > self.max_len {
                    warn!(len, max = self.max_len, "oversized frame on data ring");
                    ring.set_fault();
                    return Err(RingError::Protocol);
                }
                Partial {
                    body: vec![0u8; len],
                    filled: 0,
                }
            }
        };

        while partial.filled < partial.body.len() {
            let count = ring.read(&mut partial.body[partial.filled..], false)?;
            if count == 0 {
                self.partial = Some(partial);
                return Ok(None);
            }
            partial.filled += count;
        }
        Ok(Some(partial.body))
    }
}

impl core::fmt::Debug for FrameAssembler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameAssembler")
            .field("max_len", &self.max_len)
            .field("in_progress", &self.in_progress())
            .finish()
    }
}
