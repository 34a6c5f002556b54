// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Slot ownership, transfers, reaping and receive demultiplexing.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use tracing::{debug, trace, warn};
use xmbox_abi::constants::{MAX_REMOTES, SLOT_BUFFER_SIZE, SLOTS_PER_REMOTE, WORD_SIZE};
use xmbox_abi::layout::regs::{self, SlotMeta};
use xmbox_abi::{DatagramHeader, LocalAddress, RemoteProcessorId, SlotId};

use super::{MailboxRegs, SlotError};
use crate::queue::{QueueReceiver, QueueSender, bounded};
use crate::sync::IrqMutex;

// =============================================================================
// Configuration
// =============================================================================

/// Slot engine configuration.
///
/// Transmit slots `0..high_priority_slots` form the high-priority class;
/// the remaining slots up to `tx_slots` form the normal class. Each class
/// scans its own range first and borrows from the other when exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEngineConfig {
    /// Transmit slots in use (at most [`SLOTS_PER_REMOTE`]).
    pub tx_slots: usize,
    /// Size of the high-priority class.
    pub high_priority_slots: usize,
    /// Remote processors attached (at most [`MAX_REMOTES`]).
    pub remotes: usize,
    /// Depth of each local endpoint's inbound queue.
    pub rx_queue_depth: usize,
    /// Bytes read before acknowledging for early-ack endpoints.
    pub early_ack_prefix: usize,
}

impl SlotEngineConfig {
    /// Default configuration: all slots, two of them high priority, all remotes.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tx_slots: SLOTS_PER_REMOTE,
            high_priority_slots: 2,
            remotes: MAX_REMOTES,
            rx_queue_depth: 16,
            early_ack_prefix: 64,
        }
    }

    /// Set the number of transmit slots.
    #[must_use]
    pub const fn with_tx_slots(mut self, tx_slots: usize) -> Self {
        self.tx_slots = tx_slots;
        self
    }

    /// Set the size of the high-priority class.
    #[must_use]
    pub const fn with_high_priority_slots(mut self, slots: usize) -> Self {
        self.high_priority_slots = slots;
        self
    }

    /// Set the number of attached remote processors.
    #[must_use]
    pub const fn with_remotes(mut self, remotes: usize) -> Self {
        self.remotes = remotes;
        self
    }

    /// Set the inbound queue depth of new endpoints.
    #[must_use]
    pub const fn with_rx_queue_depth(mut self, depth: usize) -> Self {
        self.rx_queue_depth = depth;
        self
    }

    /// Set the early-ack prefix length.
    #[must_use]
    pub const fn with_early_ack_prefix(mut self, bytes: usize) -> Self {
        self.early_ack_prefix = bytes;
        self
    }

    /// Clamp every field to what the hardware supports.
    fn clamped(self) -> Self {
        let tx_slots = self.tx_slots.clamp(1, SLOTS_PER_REMOTE);
        Self {
            tx_slots,
            high_priority_slots: self.high_priority_slots.min(tx_slots),
            remotes: self.remotes.min(MAX_REMOTES),
            rx_queue_depth: self.rx_queue_depth,
            early_ack_prefix: self
                .early_ack_prefix
                .next_multiple_of(WORD_SIZE)
                .clamp(DatagramHeader::SIZE, SLOT_BUFFER_SIZE),
        }
    }
}

impl Default for SlotEngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Slot Records and Handles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Allocated, no transfer in progress.
    Owned,
    /// Allocated, transfer handed to the hardware.
    Sending,
    /// Owner let go while the transfer was in progress; the reaper frees it.
    Detached,
}

#[derive(Debug, Clone, Copy)]
struct SlotRecord {
    state: SlotState,
    generation: u32,
    payload_len: usize,
    high_priority: bool,
    target: Option<RemoteProcessorId>,
}

impl SlotRecord {
    const FREE: Self = Self {
        state: SlotState::Free,
        generation: 0,
        payload_len: 0,
        high_priority: false,
        target: None,
    };
}

/// Exclusive ownership of one transmit slot.
///
/// Handles are neither `Clone` nor `Copy`; giving one back through
/// [`SlotEngine::free_slot`], [`SlotEngine::cancel_slot`] or
/// [`SlotEngine::release_after_send`] ends the ownership.
#[must_use = "an allocated slot stays owned until freed"]
#[derive(Debug, PartialEq, Eq)]
pub struct SlotHandle {
    slot: SlotId,
    generation: u32,
}

impl SlotHandle {
    /// The owned slot.
    #[inline]
    pub const fn slot(&self) -> SlotId {
        self.slot
    }
}

/// A datagram nobody local claimed, handed to the default handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Processor whose receive buffer held the datagram.
    pub remote: RemoteProcessorId,
    /// Decoded header.
    pub header: DatagramHeader,
    /// The datagram exactly as received, header included.
    pub bytes: Vec<u8>,
}

impl Inbound {
    /// Payload after the header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(DatagramHeader::SIZE..).unwrap_or_default()
    }
}

/// Engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Datagrams pushed into a local endpoint's queue.
    pub dispatched: u64,
    /// Datagrams handed to the default handler.
    pub forwarded: u64,
    /// Receive buffers with undecodable metadata or header.
    pub malformed: u64,
    /// Datagrams lost to a full endpoint queue.
    pub dropped: u64,
    /// Detached slots freed by the reaper.
    pub reaped: u64,
    /// Readback mismatches and unexpected receive status bits.
    pub hw_faults: u64,
}

struct Endpoint {
    address: LocalAddress,
    early_ack: bool,
    queue: QueueSender,
}

struct EngineState {
    slots: [SlotRecord; SLOTS_PER_REMOTE],
    endpoints: Vec<Endpoint>,
    stats: EngineStats,
    reap_cursor: usize,
}

impl EngineState {
    /// Record owned by `handle`, or `Stale` if someone else owns the slot now.
    fn record_for(&mut self, handle: &SlotHandle) -> Result<&mut SlotRecord, SlotError> {
        let record = &mut self.slots[handle.slot.index()];
        if record.generation != handle.generation || record.state == SlotState::Free {
            return Err(SlotError::Stale);
        }
        Ok(record)
    }
}

fn slot_ids(range: Range<usize>) -> impl Iterator<Item = SlotId> {
    range.filter_map(|index| u8::try_from(index).ok().and_then(SlotId::new))
}

// =============================================================================
// Engine
// =============================================================================

/// The message-slot engine.
///
/// All slot state sits behind one [`IrqMutex`], so the send path in task
/// context and the receive path in interrupt context never interleave on it.
/// Register traffic for an owned slot happens outside the lock: ownership
/// already makes it exclusive.
pub struct SlotEngine<R: MailboxRegs> {
    regs: R,
    config: SlotEngineConfig,
    state: IrqMutex<EngineState>,
}

impl<R: MailboxRegs> SlotEngine<R> {
    /// Create an engine over a register window. All slots start free.
    pub fn new(regs: R, config: SlotEngineConfig) -> Self {
        Self {
            regs,
            config: config.clamped(),
            state: IrqMutex::new(EngineState {
                slots: [SlotRecord::FREE; SLOTS_PER_REMOTE],
                endpoints: Vec::new(),
                stats: EngineStats::default(),
                reap_cursor: 0,
            }),
        }
    }

    /// The effective configuration.
    #[must_use]
    pub const fn config(&self) -> &SlotEngineConfig {
        &self.config
    }

    /// The register window.
    #[must_use]
    pub const fn regs(&self) -> &R {
        &self.regs
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.state.lock().stats
    }

    fn tx_busy(&self, slot: usize) -> bool {
        self.regs.read32(regs::tx_block(slot) + regs::STATUS) & regs::STATUS_BUSY != 0
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Allocate a free transmit slot.
    ///
    /// `preferred` wins if it is free. Otherwise the requester's priority
    /// class is scanned first, then the other class.
    pub fn allocate_slot(
        &self,
        preferred: Option<SlotId>,
        high_priority: bool,
    ) -> Result<SlotHandle, SlotError> {
        let mut state = self.state.lock();
        let is_free = |slot: &SlotId| state.slots[slot.index()].state == SlotState::Free;

        let high = 0..self.config.high_priority_slots;
        let normal = self.config.high_priority_slots..self.config.tx_slots;
        let (first, second) = if high_priority {
            (high, normal)
        } else {
            (normal, high)
        };
        let chosen = preferred
            .filter(|slot| slot.index() < self.config.tx_slots && is_free(slot))
            .or_else(|| slot_ids(first).chain(slot_ids(second)).find(is_free));

        let Some(slot) = chosen else {
            return Err(SlotError::Busy);
        };
        let record = &mut state.slots[slot.index()];
        record.state = SlotState::Owned;
        record.generation = record.generation.wrapping_add(1);
        record.payload_len = 0;
        record.high_priority = high_priority;
        record.target = None;
        trace!(%slot, high_priority, "slot allocated");
        Ok(SlotHandle {
            slot,
            generation: record.generation,
        })
    }

    // -------------------------------------------------------------------------
    // Transfers
    // -------------------------------------------------------------------------

    /// Send `payload` to `target` on an owned slot.
    ///
    /// Returns as soon as the hardware has the transfer; use
    /// [`poll_send_done`](Self::poll_send_done) to learn when it finished.
    pub fn send(
        &self,
        handle: &SlotHandle,
        target: RemoteProcessorId,
        payload: &[u8],
    ) -> Result<(), SlotError> {
        self.transmit(handle, target, &[payload])
    }

    /// Send a datagram: the encoded `header` followed by `body`.
    pub fn send_datagram(
        &self,
        handle: &SlotHandle,
        target: RemoteProcessorId,
        header: DatagramHeader,
        body: &[u8],
    ) -> Result<(), SlotError> {
        self.transmit(handle, target, &[&header.to_bytes(), body])
    }

    /// Write `parts` back to back into the slot's window and start the transfer.
    ///
    /// Every part except the last must be a whole number of words.
    fn transmit(
        &self,
        handle: &SlotHandle,
        target: RemoteProcessorId,
        parts: &[&[u8]],
    ) -> Result<(), SlotError> {
        let len: usize = parts.iter().map(|part| part.len()).sum();
        if len > SLOT_BUFFER_SIZE {
            return Err(SlotError::TooLarge);
        }
        if target.index() >= self.config.remotes {
            return Err(SlotError::InvalidRemote);
        }

        {
            let mut state = self.state.lock();
            let record = state.record_for(handle)?;
            if record.state != SlotState::Owned {
                return Err(SlotError::InFlight);
            }
            record.state = SlotState::Sending;
            record.payload_len = len;
            record.target = Some(target);
        }

        let slot = handle.slot;
        let block = regs::tx_block(slot.index());
        let mask = u8::try_from(target.target_mask()).unwrap_or_default();
        let meta = SlotMeta::for_payload(len, slot.as_u8(), mask).encode();
        self.regs.write32(block + regs::META, meta);

        let readback = self.regs.read32(block + regs::META);
        if readback != meta {
            let mut state = self.state.lock();
            state.slots[slot.index()].state = SlotState::Free;
            state.stats.hw_faults += 1;
            warn!(%slot, wrote = meta, read = readback, "slot metadata readback mismatch");
            return Err(SlotError::HwFault(slot));
        }

        let mut offset = block + regs::DATA;
        for part in parts {
            debug_assert!(offset % WORD_SIZE == 0, "unaligned datagram part");
            self.regs.write_window(offset, part);
            offset += part.len();
        }
        self.regs.write32(block + regs::CMD, regs::CMD_SEND);
        trace!(%slot, %target, len, "transfer started");
        Ok(())
    }

    /// Returns true once the slot has no transfer in progress.
    ///
    /// A stale handle reports true: nothing of its owner is in flight.
    pub fn poll_send_done(&self, handle: &SlotHandle) -> bool {
        let mut state = self.state.lock();
        let Ok(record) = state.record_for(handle) else {
            return true;
        };
        if record.state != SlotState::Sending {
            return true;
        }
        if self.tx_busy(handle.slot.index()) {
            return false;
        }
        record.state = SlotState::Owned;
        true
    }

    // -------------------------------------------------------------------------
    // Release
    // -------------------------------------------------------------------------

    /// Give the slot back.
    ///
    /// If the hardware is still sending, the slot is detached and left to the
    /// reaper, and `InFlight` is returned. Either way the caller no longer
    /// owns the slot.
    pub fn free_slot(&self, handle: SlotHandle) -> Result<(), SlotError> {
        let mut state = self.state.lock();
        let busy = self.tx_busy(handle.slot.index());
        let record = state.record_for(&handle)?;
        if record.state == SlotState::Sending && busy {
            record.state = SlotState::Detached;
            return Err(SlotError::InFlight);
        }
        record.state = SlotState::Free;
        Ok(())
    }

    /// Abort any transfer in progress and free the slot.
    pub fn cancel_slot(&self, handle: SlotHandle) -> Result<(), SlotError> {
        let mut state = self.state.lock();
        let record = state.record_for(&handle)?;
        if record.state == SlotState::Sending {
            self.regs
                .write32(regs::tx_block(handle.slot.index()) + regs::CMD, regs::CMD_CANCEL);
            debug!(slot = %handle.slot, "transfer cancelled");
        }
        record.state = SlotState::Free;
        Ok(())
    }

    /// Hand the slot to the reaper once its transfer finishes.
    ///
    /// Frees immediately if nothing is in flight.
    pub fn release_after_send(&self, handle: SlotHandle) -> Result<(), SlotError> {
        let mut state = self.state.lock();
        let busy = self.tx_busy(handle.slot.index());
        let record = state.record_for(&handle)?;
        record.state = if record.state == SlotState::Sending && busy {
            SlotState::Detached
        } else {
            SlotState::Free
        };
        Ok(())
    }

    /// Free detached slots whose transfer finished.
    ///
    /// Examines at most `quota` detached slots, continuing round-robin from
    /// where the previous call stopped. Returns the number freed.
    pub fn reap(&self, quota: usize) -> usize {
        let mut state = self.state.lock();
        let slots = self.config.tx_slots;
        let start = state.reap_cursor;
        let mut examined = 0;
        let mut freed = 0;

        for step in 0..slots {
            if examined >= quota {
                break;
            }
            let index = (start + step) % slots;
            if state.slots[index].state != SlotState::Detached {
                continue;
            }
            examined += 1;
            state.reap_cursor = (index + 1) % slots;
            if !self.tx_busy(index) {
                let record = &mut state.slots[index];
                record.state = SlotState::Free;
                freed += 1;
                trace!(
                    slot = index,
                    len = record.payload_len,
                    high_priority = record.high_priority,
                    target = ?record.target,
                    "detached slot reaped"
                );
            }
        }

        state.stats.reaped += freed as u64;
        if freed > 0 {
            debug!(freed, "reaped finished sends");
        }
        freed
    }

    // -------------------------------------------------------------------------
    // Receive
    // -------------------------------------------------------------------------

    /// Register a local endpoint for datagrams addressed to `address`.
    ///
    /// Early-ack endpoints receive only the first
    /// [`early_ack_prefix`](SlotEngineConfig::early_ack_prefix) bytes, and the
    /// hardware buffer is released before the datagram is queued. Dropping
    /// the returned receiver retires the registration.
    pub fn register_endpoint(
        &self,
        address: LocalAddress,
        early_ack: bool,
    ) -> Result<QueueReceiver, SlotError> {
        let mut state = self.state.lock();
        state.endpoints.retain(|endpoint| !endpoint.queue.is_closed());
        if state.endpoints.iter().any(|endpoint| endpoint.address == address) {
            return Err(SlotError::AddressInUse);
        }
        let (queue, receiver) = bounded(self.config.rx_queue_depth);
        state.endpoints.push(Endpoint {
            address,
            early_ack,
            queue,
        });
        Ok(receiver)
    }

    /// Remove the endpoint at `address`. Returns false if none was registered.
    pub fn unregister_endpoint(&self, address: LocalAddress) -> bool {
        let mut state = self.state.lock();
        let before = state.endpoints.len();
        state.endpoints.retain(|endpoint| endpoint.address != address);
        state.endpoints.len() != before
    }

    /// Demultiplex every pending receive buffer.
    ///
    /// Each buffer is acknowledged exactly once. Datagrams for a registered
    /// endpoint go to its queue; everything else goes to `default`. Returns
    /// the number of buffers handled.
    pub fn on_receive_interrupt(&self, default: &mut dyn FnMut(Inbound)) -> usize {
        let mut pending = self.regs.read32(regs::RX_STATUS);
        let mut handled = 0;
        while pending != 0 {
            let bit = pending.trailing_zeros() as usize;
            pending &= pending - 1;
            self.receive_one(bit / SLOTS_PER_REMOTE, bit % SLOTS_PER_REMOTE, default);
            handled += 1;
        }
        handled
    }

    fn receive_one(&self, remote: usize, slot: usize, default: &mut dyn FnMut(Inbound)) {
        let block = regs::rx_block(remote, slot);
        let ack = || self.regs.write32(block + regs::ACK, regs::ACK_CLEAR);

        let Some(processor) = u8::try_from(remote)
            .ok()
            .and_then(RemoteProcessorId::new)
            .filter(|processor| processor.index() < self.config.remotes)
        else {
            ack();
            self.state.lock().stats.hw_faults += 1;
            warn!(remote, slot, "receive status for unattached processor");
            return;
        };

        let raw_meta = self.regs.read32(block + regs::META);
        let mut head = [0u8; DatagramHeader::SIZE];
        let decoded = SlotMeta::decode(raw_meta)
            .byte_len()
            .filter(|len| (DatagramHeader::SIZE..=SLOT_BUFFER_SIZE).contains(len))
            .and_then(|len| {
                self.regs.read_window(block + regs::DATA, &mut head);
                DatagramHeader::parse(&head).map(|header| (len, header))
            });
        let Some((len, header)) = decoded else {
            ack();
            self.state.lock().stats.malformed += 1;
            warn!(%processor, slot, meta = raw_meta, "malformed datagram");
            return;
        };

        let endpoint = self
            .state
            .lock()
            .endpoints
            .iter()
            .find(|endpoint| endpoint.address == header.destination)
            .map(|endpoint| (endpoint.early_ack, endpoint.queue.clone()));

        match endpoint {
            Some((true, queue)) => {
                let mut bytes = vec![0u8; len.min(self.config.early_ack_prefix)];
                self.regs.read_window(block + regs::DATA, &mut bytes);
                ack();
                self.deliver(&queue, bytes, &header);
            }
            Some((false, queue)) => {
                let mut bytes = vec![0u8; len];
                self.regs.read_window(block + regs::DATA, &mut bytes);
                self.deliver(&queue, bytes, &header);
                ack();
            }
            None => {
                let mut bytes = vec![0u8; len];
                self.regs.read_window(block + regs::DATA, &mut bytes);
                trace!(%header, "no local endpoint, forwarding");
                default(Inbound {
                    remote: processor,
                    header,
                    bytes,
                });
                ack();
                self.state.lock().stats.forwarded += 1;
            }
        }
    }

    fn deliver(&self, queue: &QueueSender, bytes: Vec<u8>, header: &DatagramHeader) {
        if queue.push(bytes).is_ok() {
            self.state.lock().stats.dispatched += 1;
            trace!(%header, "datagram queued");
        } else {
            self.state.lock().stats.dropped += 1;
            debug!(%header, "endpoint queue full, datagram dropped");
        }
    }
}
