// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Register access to the mailbox slot hardware.

use alloc::sync::Arc;
use core::ptr::{NonNull, read_volatile, write_volatile};

use xmbox_abi::constants::WORD_SIZE;

/// 32-bit register window of the slot hardware.
///
/// Offsets are byte offsets from the start of the window as laid out in
/// [`xmbox_abi::layout::regs`]. Data windows are accessed one word at a time;
/// the hardware does not support sub-word transfers.
pub trait MailboxRegs: Send + Sync {
    /// Read the register at `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write32(&self, offset: usize, value: u32);

    /// Copy `src` into the data window at `offset`.
    ///
    /// A trailing partial word is zero-padded.
    fn write_window(&self, offset: usize, src: &[u8]) {
        for (index, chunk) in src.chunks(WORD_SIZE).enumerate() {
            let mut word = [0u8; WORD_SIZE];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write32(offset + index * WORD_SIZE, u32::from_ne_bytes(word));
        }
    }

    /// Copy the data window at `offset` into `dst`.
    fn read_window(&self, offset: usize, dst: &mut [u8]) {
        for (index, chunk) in dst.chunks_mut(WORD_SIZE).enumerate() {
            let word = self.read32(offset + index * WORD_SIZE).to_ne_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}

impl<R: MailboxRegs + ?Sized> MailboxRegs for &R {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }

    fn write_window(&self, offset: usize, src: &[u8]) {
        (**self).write_window(offset, src);
    }

    fn read_window(&self, offset: usize, dst: &mut [u8]) {
        (**self).read_window(offset, dst);
    }
}

impl<R: MailboxRegs + ?Sized> MailboxRegs for Arc<R> {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value);
    }

    fn write_window(&self, offset: usize, src: &[u8]) {
        (**self).write_window(offset, src);
    }

    fn read_window(&self, offset: usize, dst: &mut [u8]) {
        (**self).read_window(offset, dst);
    }
}

/// Memory-mapped slot hardware.
pub struct MmioMailbox {
    /// Virtual address of the register window.
    base: NonNull<u32>,
}

// SAFETY: the register window is device memory; every access is a single
// volatile word access and the hardware serializes concurrent accesses.
unsafe impl Send for MmioMailbox {}
unsafe impl Sync for MmioMailbox {}

impl MmioMailbox {
    /// Wrap a mapped register window.
    ///
    /// # Safety
    ///
    /// `base` must point to the mapped slot hardware, mapped as device memory
    /// and valid for [`xmbox_abi::layout::regs::WINDOW_SIZE`] bytes.
    #[must_use]
    pub const unsafe fn new(base: NonNull<u32>) -> Self {
        Self { base }
    }
}

impl MailboxRegs for MmioMailbox {
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: offsets come from the register layout and stay inside the
        // mapped window; registers are 4-byte aligned.
        unsafe { read_volatile(self.base.as_ptr().byte_add(offset)) }
    }

    fn write32(&self, offset: usize, value: u32) {
        // SAFETY: see `read32`.
        unsafe { write_volatile(self.base.as_ptr().byte_add(offset), value) };
    }
}

impl core::fmt::Debug for MmioMailbox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MmioMailbox").field("base", &self.base).finish()
    }
}
