// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Slotted request/response command ring.
//!
//! The client owns `request_producer` and `response_consumer`; the server
//! owns `request_consumer` and `response_producer`. The server answers in
//! order and writes each response over the slot of the request it answers,
//! so the ring is full when `request_producer - response_consumer` reaches
//! the slot count.

use alloc::sync::Arc;

use tracing::{debug, warn};
use xmbox_abi::constants::{
    COMMAND_SLOT_COUNT, COMMAND_SLOT_HEADER_SIZE, COMMAND_SLOT_SIZE, MAX_PARAM_SIZE,
};
use xmbox_abi::layout::command_ring;
use xmbox_abi::{CommandKind, ParamBlock, RequestId, Request, Response, ResultCode};

use super::{CallError, PendingCall, PendingList, RingError};
use crate::platform::{Doorbell, Platform};
use crate::shm::SharedRegion;
use crate::sync::IrqMutex;

// =============================================================================
// Layout
// =============================================================================

/// Slot geometry of a command ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRingLayout {
    slot_count: u32,
    slot_size: u32,
}

impl CommandRingLayout {
    /// The geometry every domain uses unless configured otherwise.
    pub const DEFAULT: Self = Self {
        slot_count: COMMAND_SLOT_COUNT,
        slot_size: COMMAND_SLOT_SIZE,
    };

    /// Validate a geometry.
    ///
    /// The slot count must be a power of two and a slot must hold the fixed
    /// slot header plus a full parameter block, in whole words.
    #[must_use]
    pub const fn new(slot_count: u32, slot_size: u32) -> Option<Self> {
        if !slot_count.is_power_of_two()
            || slot_size % 4 != 0
            || (slot_size as usize) < COMMAND_SLOT_HEADER_SIZE + MAX_PARAM_SIZE
        {
            return None;
        }
        Some(Self {
            slot_count,
            slot_size,
        })
    }

    /// Number of slots.
    #[must_use]
    pub const fn slot_count(&self) -> u32 {
        self.slot_count
    }

    /// Size of one slot in bytes.
    #[must_use]
    pub const fn slot_size(&self) -> u32 {
        self.slot_size
    }

    /// Size of the shared region this geometry needs.
    #[must_use]
    pub const fn region_size(&self) -> usize {
        command_ring::region_size(self.slot_count as usize, self.slot_size as usize)
    }

    const fn slot_offset(&self, position: u32) -> usize {
        command_ring::slot_offset(
            (position & (self.slot_count - 1)) as usize,
            self.slot_size as usize,
        )
    }
}

impl Default for CommandRingLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A slot as found in shared memory, before validation.
struct RawSlot {
    id: u32,
    command: u32,
    status: u32,
    params: Option<ParamBlock>,
}

fn read_slot(region: &SharedRegion, ring: CommandRingLayout, position: u32) -> RawSlot {
    let base = ring.slot_offset(position);
    let param_len = region.load_u32(base + command_ring::SLOT_PARAM_LEN) as usize;
    let params = (param_len <= MAX_PARAM_SIZE).then(|| {
        let mut raw = [0u8; MAX_PARAM_SIZE];
        region.copy_out(base + command_ring::SLOT_PARAMS, &mut raw[..param_len]);
        ParamBlock::from_slice(&raw[..param_len])
    });
    RawSlot {
        id: region.load_u32(base + command_ring::SLOT_REQUEST_ID),
        command: region.load_u32(base + command_ring::SLOT_COMMAND),
        status: region.load_u32(base + command_ring::SLOT_STATUS),
        params: params.flatten(),
    }
}

/// Slot header fields to write: request id, command, status.
type SlotHeader = (u32, u32, u32);

fn write_slot(
    region: &SharedRegion,
    ring: CommandRingLayout,
    position: u32,
    (id, command, status): SlotHeader,
    params: &ParamBlock,
) {
    let base = ring.slot_offset(position);
    region.store_u32(base + command_ring::SLOT_REQUEST_ID, id);
    region.store_u32(base + command_ring::SLOT_COMMAND, command);
    region.store_u32(base + command_ring::SLOT_STATUS, status);
    region.store_u32(base + command_ring::SLOT_PARAM_LEN, params.len() as u32);
    region.copy_in(base + command_ring::SLOT_PARAMS, params.as_slice());
}

fn check_region(region: &SharedRegion, ring: CommandRingLayout) -> Result<(), RingError> {
    if region.len() < ring.region_size() {
        return Err(RingError::RegionTooSmall);
    }
    Ok(())
}

// =============================================================================
// Client
// =============================================================================

struct ClientState {
    pending: PendingList,
}

/// Requesting end of a command ring.
///
/// Shared by every task of a domain. Cursor updates and the pending list sit
/// behind one [`IrqMutex`].
pub struct CommandClient {
    region: Arc<SharedRegion>,
    layout: CommandRingLayout,
    doorbell: Arc<dyn Doorbell>,
    state: IrqMutex<ClientState>,
}

impl CommandClient {
    /// Initialize a command ring in `region` and publish its geometry.
    pub fn create(
        region: Arc<SharedRegion>,
        layout: CommandRingLayout,
        doorbell: Arc<dyn Doorbell>,
    ) -> Result<Self, RingError> {
        check_region(&region, layout)?;
        region.zero(0, command_ring::HEADER_SIZE);
        region.store_u32(command_ring::SLOT_COUNT, layout.slot_count);
        region.store_u32(command_ring::SLOT_SIZE, layout.slot_size);
        Ok(Self {
            region,
            layout,
            doorbell,
            state: IrqMutex::new(ClientState {
                pending: PendingList::new(),
            }),
        })
    }

    /// The ring geometry.
    #[must_use]
    pub const fn layout(&self) -> CommandRingLayout {
        self.layout
    }

    /// Push a request without waiting for its response.
    ///
    /// Fails with `Full` immediately if every slot is occupied.
    pub fn enqueue_request(&self, request: &Request) -> Result<RequestId, CallError> {
        let _state = self.state.lock();
        self.enqueue_locked(request)
    }

    /// Caller holds the state lock.
    fn enqueue_locked(&self, request: &Request) -> Result<RequestId, CallError> {
        let producer = self.region.load_u32(command_ring::REQUEST_PRODUCER);
        let consumed = self.region.load_u32(command_ring::RESPONSE_CONSUMER);
        if producer.wrapping_sub(consumed) >= self.layout.slot_count {
            return Err(CallError::Full);
        }

        let id = RequestId::for_position(producer, self.layout.slot_count);
        let header = (id.as_u32(), request.command as u32, 0);
        write_slot(&self.region, self.layout, producer, header, &request.params);
        // Release store: the slot contents are visible before the cursor
        self.region
            .store_u32(command_ring::REQUEST_PRODUCER, producer.wrapping_add(1));
        self.doorbell.ring();
        Ok(id)
    }

    /// Push a request and list it as pending without waiting.
    ///
    /// [`Self::poll_responses`] completes the returned call. The caller
    /// unlists it with [`Self::withdraw`] once it is done with it.
    pub fn submit(&self, request: &Request) -> Result<Arc<PendingCall>, CallError> {
        let mut state = self.state.lock();
        let id = self.enqueue_locked(request)?;
        let call = Arc::new(PendingCall::new(id));
        state.pending.push(Arc::clone(&call));
        Ok(call)
    }

    /// Unlist `call`. Returns false if it was not listed.
    pub fn withdraw(&self, call: &Arc<PendingCall>) -> bool {
        self.state.lock().pending.remove(call)
    }

    /// Issue `request` and wait for its response.
    ///
    /// Waits by polling the response ring and backing off through
    /// `platform.relax()`. After `timeout_ns` the call is withdrawn from the
    /// pending list and `Timeout` is returned; a response arriving later is
    /// discarded.
    pub fn call<P: Platform>(
        &self,
        platform: &P,
        request: &Request,
        timeout_ns: u64,
    ) -> Result<Response, CallError> {
        let call = self.submit(request)?;
        let result = self.wait(platform, &call, timeout_ns);
        self.withdraw(&call);
        match result {
            // Nothing can complete the call once it is unlisted
            Err(CallError::Timeout) => call.take().ok_or(CallError::Timeout),
            other => other,
        }
    }

    /// Wait up to `timeout_ns` for a submitted call to complete.
    ///
    /// The call stays listed whatever the outcome, so a response arriving
    /// after `Timeout` still completes it.
    pub fn wait<P: Platform>(
        &self,
        platform: &P,
        call: &PendingCall,
        timeout_ns: u64,
    ) -> Result<Response, CallError> {
        let deadline = platform.now_ns().saturating_add(timeout_ns);
        loop {
            let polled = self.poll_responses();
            if let Some(response) = call.take() {
                return Ok(response);
            }
            polled?;
            if platform.now_ns() >= deadline {
                debug!(id = %call.id(), "command call timed out");
                return Err(CallError::Timeout);
            }
            platform.relax();
        }
    }

    /// Consume every published response and complete the matching calls.
    ///
    /// Responses nobody waits for any more are dropped. Returns the number
    /// of responses consumed.
    pub fn poll_responses(&self) -> Result<usize, CallError> {
        let state = self.state.lock();
        let requested = self.region.load_u32(command_ring::REQUEST_PRODUCER);
        let produced = self.region.load_u32(command_ring::RESPONSE_PRODUCER);
        let mut consumed = self.region.load_u32(command_ring::RESPONSE_CONSUMER);

        if produced.wrapping_sub(consumed) > requested.wrapping_sub(consumed) {
            warn!(requested, produced, consumed, "command ring response cursor skew");
            return Err(CallError::Fault);
        }

        let mut handled = 0;
        while consumed != produced {
            let raw = read_slot(&self.region, self.layout, consumed);
            let id = RequestId::new(raw.id);
            let response = match (ResultCode::from_u32(raw.status), raw.params) {
                (Some(status), Some(params)) => Response { status, params },
                _ => Response::status(ResultCode::Invalid),
            };
            match state.pending.find_waiting(id) {
                Some(call) => call.complete(response),
                None => debug!(%id, "dropping response nobody waits for"),
            }
            consumed = consumed.wrapping_add(1);
            handled += 1;
        }
        if handled > 0 {
            self.region.store_u32(command_ring::RESPONSE_CONSUMER, consumed);
        }
        Ok(handled)
    }

    /// Returns true while a call for `id` is listed as pending.
    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.state.lock().pending.contains(id)
    }

    /// Number of listed calls.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl core::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandClient")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Server
// =============================================================================

/// Responding end of a command ring.
///
/// The shared header is written by an untrusted peer. The server keeps its
/// own cursors locally and only publishes them.
pub struct CommandServer {
    region: Arc<SharedRegion>,
    layout: CommandRingLayout,
    doorbell: Arc<dyn Doorbell>,
    request_consumer: u32,
    response_producer: u32,
}

impl CommandServer {
    /// Attach to a ring the client created, validating its published geometry.
    pub fn attach(region: Arc<SharedRegion>, doorbell: Arc<dyn Doorbell>) -> Result<Self, RingError> {
        let layout = CommandRingLayout::new(
            region.load_u32(command_ring::SLOT_COUNT),
            region.load_u32(command_ring::SLOT_SIZE),
        )
        .ok_or(RingError::BadLayout)?;
        check_region(&region, layout)?;
        Ok(Self {
            request_consumer: region.load_u32(command_ring::REQUEST_CONSUMER),
            response_producer: region.load_u32(command_ring::RESPONSE_PRODUCER),
            region,
            layout,
            doorbell,
        })
    }

    /// The ring geometry.
    #[must_use]
    pub const fn layout(&self) -> CommandRingLayout {
        self.layout
    }

    /// Answer every queued request in order.
    ///
    /// Undecodable requests are answered with `Invalid` without reaching
    /// `handler`. The client is notified once per batch. Returns the number
    /// of requests answered.
    pub fn process(
        &mut self,
        mut handler: impl FnMut(&Request) -> Response,
    ) -> Result<usize, RingError> {
        let produced = self.region.load_u32(command_ring::REQUEST_PRODUCER);
        if produced.wrapping_sub(self.request_consumer) > self.layout.slot_count {
            warn!(
                produced,
                consumed = self.request_consumer,
                "command ring request cursor skew"
            );
            return Err(RingError::Protocol);
        }

        let mut handled = 0;
        while self.request_consumer != produced {
            let raw = read_slot(&self.region, self.layout, self.request_consumer);
            let request = CommandKind::from_u32(raw.command)
                .zip(raw.params)
                .map(|(command, params)| Request { command, params });
            let response = match request {
                Some(request) => handler(&request),
                None => {
                    debug!(id = raw.id, command = raw.command, "undecodable command");
                    Response::status(ResultCode::Invalid)
                }
            };

            write_slot(
                &self.region,
                self.layout,
                self.response_producer,
                (raw.id, raw.command, response.status as u32),
                &response.params,
            );
            self.request_consumer = self.request_consumer.wrapping_add(1);
            self.response_producer = self.response_producer.wrapping_add(1);
            handled += 1;
        }

        if handled > 0 {
            self.region
                .store_u32(command_ring::REQUEST_CONSUMER, self.request_consumer);
            self.region
                .store_u32(command_ring::RESPONSE_PRODUCER, self.response_producer);
            self.doorbell.ring();
        }
        Ok(handled)
    }
}

impl core::fmt::Debug for CommandServer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandServer")
            .field("layout", &self.layout)
            .field("request_consumer", &self.request_consumer)
            .field("response_producer", &self.response_producer)
            .finish_non_exhaustive()
    }
}
