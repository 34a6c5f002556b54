// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Register-level emulation of the slot hardware.
//!
//! `MockMailbox` decodes register offsets exactly like the real window, so
//! the engine under test runs its production code paths. Test helpers play
//! the remote processors: they inject receive buffers, complete or stall
//! sends, and inject faults.

use std::vec;
use std::vec::Vec;

use xmbox_abi::constants::{MAX_REMOTES, SLOT_BUFFER_SIZE, SLOTS_PER_REMOTE};
use xmbox_abi::layout::regs::{self, SlotMeta};

use super::MailboxRegs;

/// A transfer the engine handed to the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Transmitting slot.
    pub slot: u8,
    /// Target processor mask from `META`.
    pub target_mask: u8,
    /// Exact payload bytes.
    pub bytes: Vec<u8>,
}

struct TxSlot {
    meta: u32,
    busy: bool,
    readback_fault: bool,
    data: Vec<u8>,
}

struct RxSlot {
    meta: u32,
    data: Vec<u8>,
}

struct MockState {
    rx_status: u32,
    tx: Vec<TxSlot>,
    rx: Vec<RxSlot>,
    sent: Vec<SentFrame>,
    auto_complete: bool,
    acks: usize,
    cancels: usize,
}

/// Which part of the window an offset hits.
enum Target {
    RxStatus,
    Tx { slot: usize, reg: usize },
    Rx { index: usize, reg: usize },
    Unmapped,
}

fn decode(offset: usize) -> Target {
    if offset == regs::RX_STATUS {
        return Target::RxStatus;
    }
    if offset >= regs::RX_BASE {
        let index = (offset - regs::RX_BASE) / regs::RX_STRIDE;
        if index < MAX_REMOTES * SLOTS_PER_REMOTE {
            return Target::Rx {
                index,
                reg: (offset - regs::RX_BASE) % regs::RX_STRIDE,
            };
        }
        return Target::Unmapped;
    }
    if offset >= regs::TX_BASE {
        let slot = (offset - regs::TX_BASE) / regs::TX_STRIDE;
        if slot < SLOTS_PER_REMOTE {
            return Target::Tx {
                slot,
                reg: (offset - regs::TX_BASE) % regs::TX_STRIDE,
            };
        }
    }
    Target::Unmapped
}

fn window_index(reg: usize) -> Option<usize> {
    reg.checked_sub(regs::DATA)
        .filter(|at| at + 4 <= SLOT_BUFFER_SIZE)
}

fn load_word(data: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[at..at + 4]);
    u32::from_ne_bytes(word)
}

/// Emulated slot hardware.
pub struct MockMailbox {
    state: spin::Mutex<MockState>,
}

impl MockMailbox {
    /// Create idle hardware: no pending receives, all slots idle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: spin::Mutex::new(MockState {
                rx_status: 0,
                tx: (0..SLOTS_PER_REMOTE)
                    .map(|_| TxSlot {
                        meta: 0,
                        busy: false,
                        readback_fault: false,
                        data: vec![0; SLOT_BUFFER_SIZE],
                    })
                    .collect(),
                rx: (0..MAX_REMOTES * SLOTS_PER_REMOTE)
                    .map(|_| RxSlot {
                        meta: 0,
                        data: vec![0; SLOT_BUFFER_SIZE],
                    })
                    .collect(),
                sent: Vec::new(),
                auto_complete: false,
                acks: 0,
                cancels: 0,
            }),
        }
    }

    /// Deliver `bytes` into receive buffer `(remote, slot)` and raise its status bit.
    ///
    /// Returns false if that buffer still holds unacknowledged data.
    pub fn inject(&self, remote: usize, slot: usize, bytes: &[u8]) -> bool {
        let meta = SlotMeta::for_payload(bytes.len(), slot as u8, 0).encode();
        self.inject_raw(remote, slot, meta, bytes)
    }

    /// Deliver `bytes` with an arbitrary `META` value.
    pub fn inject_raw(&self, remote: usize, slot: usize, meta: u32, bytes: &[u8]) -> bool {
        let mut state = self.state.lock();
        let bit = regs::rx_bit(remote, slot);
        if state.rx_status & bit != 0 {
            return false;
        }
        let rx = &mut state.rx[regs::rx_index(remote, slot)];
        rx.meta = meta;
        rx.data.fill(0);
        rx.data[..bytes.len()].copy_from_slice(bytes);
        state.rx_status |= bit;
        true
    }

    /// Returns true while receive buffer `(remote, slot)` awaits acknowledgement.
    #[must_use]
    pub fn is_pending(&self, remote: usize, slot: usize) -> bool {
        self.state.lock().rx_status & regs::rx_bit(remote, slot) != 0
    }

    /// Finish the transfer on `slot`.
    pub fn complete_send(&self, slot: usize) {
        self.state.lock().tx[slot].busy = false;
    }

    /// Finish every transfer in progress.
    pub fn complete_all(&self) {
        for tx in &mut self.state.lock().tx {
            tx.busy = false;
        }
    }

    /// When set, sends finish immediately.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.state.lock().auto_complete = enabled;
    }

    /// Corrupt `META` readback on `slot` until cleared.
    pub fn set_readback_fault(&self, slot: usize, enabled: bool) {
        self.state.lock().tx[slot].readback_fault = enabled;
    }

    /// Take every transfer started so far.
    pub fn take_sent(&self) -> Vec<SentFrame> {
        core::mem::take(&mut self.state.lock().sent)
    }

    /// Number of receive acknowledgements written.
    #[must_use]
    pub fn ack_count(&self) -> usize {
        self.state.lock().acks
    }

    /// Number of cancel commands written.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.state.lock().cancels
    }
}

impl Default for MockMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxRegs for MockMailbox {
    fn read32(&self, offset: usize) -> u32 {
        let state = self.state.lock();
        match decode(offset) {
            Target::RxStatus => state.rx_status,
            Target::Tx { slot, reg } => {
                let tx = &state.tx[slot];
                match reg {
                    regs::META if tx.readback_fault => tx.meta ^ 0x1,
                    regs::META => tx.meta,
                    regs::STATUS => u32::from(tx.busy) * regs::STATUS_BUSY,
                    _ => window_index(reg).map_or(0, |at| load_word(&tx.data, at)),
                }
            }
            Target::Rx { index, reg } => {
                let rx = &state.rx[index];
                match reg {
                    regs::META => rx.meta,
                    _ => window_index(reg).map_or(0, |at| load_word(&rx.data, at)),
                }
            }
            Target::Unmapped => 0,
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut state = self.state.lock();
        match decode(offset) {
            Target::RxStatus | Target::Unmapped => {}
            Target::Tx { slot, reg } => match reg {
                regs::META => state.tx[slot].meta = value,
                regs::CMD if value == regs::CMD_SEND => {
                    let meta = SlotMeta::decode(state.tx[slot].meta);
                    let len = meta.byte_len().unwrap_or(0).min(SLOT_BUFFER_SIZE);
                    let frame = SentFrame {
                        slot: slot as u8,
                        target_mask: meta.target_mask,
                        bytes: state.tx[slot].data[..len].to_vec(),
                    };
                    state.sent.push(frame);
                    state.tx[slot].busy = !state.auto_complete;
                }
                regs::CMD if value == regs::CMD_CANCEL => {
                    state.tx[slot].busy = false;
                    state.cancels += 1;
                }
                _ => {
                    if let Some(at) = window_index(reg) {
                        state.tx[slot].data[at..at + 4].copy_from_slice(&value.to_ne_bytes());
                    }
                }
            },
            Target::Rx { index, reg } => {
                if reg == regs::ACK && value == regs::ACK_CLEAR {
                    state.rx_status &= !(1 << index);
                    state.acks += 1;
                }
            }
        }
    }
}
