// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Client-visible channels.
//!
//! A channel moves through `Closed → Opening → Open → Closing → Closed`.
//! `Opening` falls back to `Closed` when the open fails, and `Open` drops
//! straight to `Closed` when either side faults the data ring.
//!
//! Datagrams travel on the data ring as length-prefixed frames. A frame
//! bigger than the free space is written in chunks; whatever the spin
//! budget could not place stays in a backlog that is flushed before the
//! next frame, so the byte stream never loses sync.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use tracing::{debug, trace, warn};
use xmbox_abi::constants::MAX_DATAGRAM_PAYLOAD;
use xmbox_abi::{CloseRequest, LocalAddress, RemoteDescriptor, Request, ResultCode, RingRef};
use xmbox_transport::platform::Platform;
use xmbox_transport::ring::encode_prefix;
use xmbox_transport::{CallError, DataRing, FrameAssembler, PendingCall, RingError};

use crate::error::SendError;
use crate::frontend::Shared;


/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No routing entry exists, or the ring is dead.
    Closed,
    /// Open request issued, no response yet.
    Opening,
    /// Routing entry installed; traffic flows.
    Open,
    /// Close request issued.
    Closing,
}

type ReceiveCallback = Box<dyn FnMut(&[u8]) + Send>;

/// One open channel to a remote endpoint.
pub struct Channel<P: Platform> {
    shared: Arc<Shared<P>>,
    local: LocalAddress,
    remote: RemoteDescriptor,
    /// Region backing the ring; `None` once handed back to the frontend.
    ring_ref: Option<RingRef>,
    ring: DataRing,
    assembler: FrameAssembler,
    max_payload: usize,
    state: ChannelState,
    backlog: Vec<u8>,
    callback: Option<ReceiveCallback>,
}

impl<P: Platform> Channel<P> {
    pub(crate) fn opening(
        shared: Arc<Shared<P>>,
        local: LocalAddress,
        remote: RemoteDescriptor,
        ring_ref: RingRef,
        ring: DataRing,
    ) -> Self {
        Self {
            shared,
            local,
            remote,
            ring_ref: Some(ring_ref),
            ring,
            assembler: FrameAssembler::new(MAX_DATAGRAM_PAYLOAD),
            max_payload: 0,
            state: ChannelState::Opening,
            backlog: Vec::new(),
            callback: None,
        }
    }

    pub(crate) fn mark_open(&mut self, max_payload: usize) {
        self.max_payload = max_payload;
        self.state = ChannelState::Open;
    }

    /// Give up on an open that did not succeed.
    ///
    /// With `uncertain` set the multiplexer may still act on the request, so
    /// a close is queued behind it and the region is quarantined until that
    /// close is answered.
    pub(crate) fn abandon(&mut self, uncertain: bool) {
        self.state = ChannelState::Closed;
        let Some(ring_ref) = self.ring_ref.take() else {
            return;
        };
        if uncertain {
            let close = self.enqueue_close();
            self.shared.quarantine_ref(ring_ref, close);
        } else {
            self.shared.release_ref(ring_ref);
        }
    }

    fn close_request(&self) -> Request {
        CloseRequest {
            local_address: self.local,
        }
        .to_request()
    }

    /// Queue a close without waiting; the returned call stays listed.
    fn enqueue_close(&self) -> Option<Arc<PendingCall>> {
        match self.shared.commands.submit(&self.close_request()) {
            Ok(call) => Some(call),
            Err(err) => {
                debug!(local = %self.local, %err, "could not queue close");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Local address of the channel.
    #[must_use]
    pub const fn local(&self) -> LocalAddress {
        self.local
    }

    /// Far end of the channel.
    #[must_use]
    pub const fn remote(&self) -> RemoteDescriptor {
        self.remote
    }

    /// Largest datagram [`send`](Self::send) accepts.
    #[must_use]
    pub const fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Returns true while traffic can flow.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Bytes of an earlier frame still waiting for ring space.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Capacity of the data ring in each direction.
    #[must_use]
    pub const fn ring_capacity(&self) -> usize {
        self.ring.capacity()
    }

    // -------------------------------------------------------------------------
    // Sending
    // -------------------------------------------------------------------------

    fn fail(&mut self, err: RingError) -> SendError {
        warn!(local = %self.local, remote = %self.remote, %err, "data ring dead, channel closed");
        self.state = ChannelState::Closed;
        self.backlog.clear();
        SendError::ChannelClosed
    }

    fn check_open(&mut self) -> Result<(), SendError> {
        if self.state != ChannelState::Open {
            return Err(SendError::ChannelClosed);
        }
        if self.ring.is_faulted() {
            return Err(self.fail(RingError::PeerFault));
        }
        Ok(())
    }

    /// Write as much of `bytes` as the ring takes within the spin budget.
    ///
    /// The budget counts consecutive writes that found the ring full; any
    /// progress resets it.
    fn write_budgeted(&mut self, bytes: &[u8]) -> Result<usize, SendError> {
        let mut written = 0;
        let mut spins = 0;
        while written < bytes.len() {
            let count = match self.ring.write(&bytes[written..]) {
                Ok(count) => count,
                Err(err) => return Err(self.fail(err)),
            };
            if count > 0 {
                written += count;
                spins = 0;
                continue;
            }
            if spins >= self.shared.config.send_spin_budget {
                break;
            }
            spins += 1;
            self.shared.platform.relax();
        }
        Ok(written)
    }

    /// Push any backlog into the ring. Returns true once it is empty.
    pub fn flush(&mut self) -> Result<bool, SendError> {
        self.check_open()?;
        if self.backlog.is_empty() {
            return Ok(true);
        }
        let backlog = core::mem::take(&mut self.backlog);
        let written = self.write_budgeted(&backlog)?;
        self.backlog = backlog;
        self.backlog.drain(..written);
        Ok(self.backlog.is_empty())
    }

    /// Send one datagram.
    ///
    /// Returns the payload length once the frame is accepted. A frame that
    /// only partly fit is finished by later `send` or `flush` calls. Fails
    /// with `Busy`, having written nothing, if the ring stayed full for the
    /// whole spin budget.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize, SendError> {
        self.check_open()?;
        if payload.len() > self.max_payload {
            return Err(SendError::TooLarge);
        }
        if !self.flush()? {
            return Err(SendError::Busy);
        }
        let prefix = encode_prefix(payload.len()).ok_or(SendError::TooLarge)?;

        let mut frame = Vec::with_capacity(prefix.len() + payload.len());
        frame.extend_from_slice(&prefix);
        frame.extend_from_slice(payload);
        let written = self.write_budgeted(&frame)?;
        if written == 0 {
            return Err(SendError::Busy);
        }
        if written < frame.len() {
            trace!(local = %self.local, written, total = frame.len(), "frame partly queued");
            self.backlog = frame.split_off(written);
        }
        Ok(payload.len())
    }

    // -------------------------------------------------------------------------
    // Receiving
    // -------------------------------------------------------------------------

    /// Next complete datagram, if one has arrived.
    pub fn poll_receive(&mut self) -> Option<Vec<u8>> {
        if self.state != ChannelState::Open {
            return None;
        }
        match self.assembler.pump(&mut self.ring) {
            Ok(frame) => frame,
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Wait up to `timeout_ns` for the next datagram.
    pub fn recv(&mut self, timeout_ns: u64) -> Option<Vec<u8>> {
        let deadline = self.shared.platform.now_ns().saturating_add(timeout_ns);
        loop {
            if let Some(frame) = self.poll_receive() {
                return Some(frame);
            }
            if !self.is_open() || self.shared.platform.now_ns() >= deadline {
                return None;
            }
            self.shared.platform.relax();
        }
    }

    /// Install the callback [`dispatch_received`](Self::dispatch_received) feeds.
    pub fn set_receive_callback(&mut self, callback: impl FnMut(&[u8]) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Hand every waiting datagram to the receive callback.
    ///
    /// Without a callback nothing is consumed. Returns the number delivered.
    pub fn dispatch_received(&mut self) -> usize {
        let Some(mut callback) = self.callback.take() else {
            return 0;
        };
        let mut delivered = 0;
        while let Some(frame) = self.poll_receive() {
            callback(&frame);
            delivered += 1;
        }
        self.callback = Some(callback);
        delivered
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Close the channel and hand its region back.
    ///
    /// A partly written frame gets one more spin budget to reach the ring;
    /// whatever is still left is dropped. A channel that already died from
    /// a ring fault still tells the multiplexer, so the region is known to
    /// be detached. If the close goes unanswered the region is quarantined
    /// until the late answer arrives.
    pub fn close(mut self) {
        if self.state == ChannelState::Open && self.flush() == Ok(false) {
            warn!(local = %self.local, discarded = self.backlog.len(), "backlog dropped on close");
        }
        let Some(ring_ref) = self.ring_ref.take() else {
            return;
        };
        self.state = ChannelState::Closing;
        let shared = Arc::clone(&self.shared);
        let call = match shared.commands.submit(&self.close_request()) {
            Ok(call) => call,
            Err(err) => {
                warn!(local = %self.local, %err, "close failed");
                shared.quarantine_ref(ring_ref, None);
                self.state = ChannelState::Closed;
                return;
            }
        };
        match shared
            .commands
            .wait(&shared.platform, &call, shared.config.close_timeout_ns)
        {
            Ok(response) if matches!(response.status, ResultCode::Ok | ResultCode::NotFound) => {
                shared.commands.withdraw(&call);
                debug!(local = %self.local, status = %response.status, "channel closed");
                shared.release_ref(ring_ref);
            }
            Ok(response) => {
                shared.commands.withdraw(&call);
                warn!(local = %self.local, status = %response.status, "close refused");
                shared.quarantine_ref(ring_ref, None);
            }
            Err(CallError::Timeout) => {
                warn!(local = %self.local, "close timed out");
                shared.quarantine_ref(ring_ref, Some(call));
            }
            Err(err) => {
                shared.commands.withdraw(&call);
                warn!(local = %self.local, %err, "close failed");
                shared.quarantine_ref(ring_ref, None);
            }
        }
        self.state = ChannelState::Closed;
    }
}

impl<P: Platform> Drop for Channel<P> {
    fn drop(&mut self) {
        // Dropped without close: tell the multiplexer but do not wait
        if let Some(ring_ref) = self.ring_ref.take() {
            if !self.backlog.is_empty() {
                debug!(local = %self.local, discarded = self.backlog.len(), "backlog dropped");
            }
            let close = self.enqueue_close();
            self.shared.quarantine_ref(ring_ref, close);
        }
    }
}

impl<P: Platform> fmt::Debug for Channel<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("state", &self.state)
            .field("ring", &self.ring)
            .field("backlog", &self.backlog.len())
            .finish_non_exhaustive()
    }
}
