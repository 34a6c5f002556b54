// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The per-domain channel frontend.
//!
//! The frontend owns the domain's end of its command ring and the regions
//! the domain granted to the privileged side. Every open channel occupies
//! one granted region as its data ring.
//!
//! A region whose open or close request timed out is quarantined rather
//! than reused: the multiplexer may still attach to it later, and a fresh
//! channel in the same region would share bytes with that stale attachment.
//! The close queued behind it stays listed, and its answer hands the region
//! back.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use tracing::{debug, warn};
use xmbox_abi::constants::MAX_DATAGRAM_PAYLOAD;
use xmbox_abi::{
    LocalAddress, OpenRequest, OpenResponse, RemoteDescriptor, ResultCode, RingRef,
};
use xmbox_transport::platform::{Doorbell, Platform};
use xmbox_transport::{
    CallError, CommandClient, DataRing, GrantTable, IrqMutex, PendingCall, Side,
};

use crate::channel::Channel;
use crate::config::ChannelConfig;
use crate::error::OpenError;


#[derive(Debug)]
enum RefState {
    Free,
    InUse,
    /// Retired until the close queued behind it is answered. Without a
    /// close in flight the region stays retired.
    Quarantined(Option<Arc<PendingCall>>),
}

/// State shared by the frontend and its channels.
pub(crate) struct Shared<P> {
    pub(crate) platform: P,
    pub(crate) config: ChannelConfig,
    pub(crate) commands: CommandClient,
    pub(crate) doorbell: Arc<dyn Doorbell>,
    grants: GrantTable,
    refs: IrqMutex<Vec<RefState>>,
}

impl<P> Shared<P> {
    fn claim_ref(&self) -> Option<RingRef> {
        let mut refs = self.refs.lock();
        let index = refs
            .iter()
            .position(|state| matches!(state, RefState::Free))?;
        let ring_ref = RingRef::new(u32::try_from(index).ok()?);
        refs[index] = RefState::InUse;
        Some(ring_ref)
    }

    fn set_ref(&self, ring_ref: RingRef, state: RefState) {
        if let Some(slot) = self.refs.lock().get_mut(ring_ref.index()) {
            *slot = state;
        }
    }

    /// Return a region the multiplexer provably no longer uses.
    pub(crate) fn release_ref(&self, ring_ref: RingRef) {
        self.set_ref(ring_ref, RefState::Free);
    }

    /// Retire a region the multiplexer may still be attached to.
    ///
    /// `close` is the listed close call whose answer proves the region
    /// detached.
    pub(crate) fn quarantine_ref(&self, ring_ref: RingRef, close: Option<Arc<PendingCall>>) {
        debug!(
            ring_ref = ring_ref.as_u32(),
            close = ?close.as_ref().map(|call| call.id()),
            "ring region quarantined"
        );
        self.set_ref(ring_ref, RefState::Quarantined(close));
    }

    /// Free quarantined regions whose close was answered.
    fn reclaim(&self) -> usize {
        if let Err(err) = self.commands.poll_responses() {
            debug!(%err, "cannot poll command responses");
        }
        let mut reclaimed = 0;
        let mut refs = self.refs.lock();
        for (index, state) in refs.iter_mut().enumerate() {
            let RefState::Quarantined(Some(close)) = state else {
                continue;
            };
            let Some(response) = close.take() else {
                continue;
            };
            self.commands.withdraw(close);
            if matches!(response.status, ResultCode::Ok | ResultCode::NotFound) {
                debug!(ring_ref = index, "quarantined ring region reclaimed");
                *state = RefState::Free;
                reclaimed += 1;
            } else {
                warn!(ring_ref = index, status = %response.status, "close refused, region stays retired");
                *state = RefState::Quarantined(None);
            }
        }
        reclaimed
    }

    fn count_refs(&self, wanted: fn(&RefState) -> bool) -> usize {
        self.refs.lock().iter().filter(|state| wanted(state)).count()
    }
}

/// Client side of one domain.
pub struct Frontend<P: Platform> {
    shared: Arc<Shared<P>>,
}

impl<P: Platform> Frontend<P> {
    /// Create a frontend over the domain's command ring client.
    ///
    /// `grants` is the domain's view of its grant table; every region in it
    /// must be large enough for a ring of `config.ring_order`.
    pub fn new(
        platform: P,
        commands: CommandClient,
        grants: GrantTable,
        doorbell: Arc<dyn Doorbell>,
        config: ChannelConfig,
    ) -> Self {
        let refs = grants.refs().map(|_| RefState::Free).collect();
        Self {
            shared: Arc::new(Shared {
                platform,
                config,
                commands,
                doorbell,
                grants,
                refs: IrqMutex::new(refs),
            }),
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// The command ring client.
    #[must_use]
    pub fn commands(&self) -> &CommandClient {
        &self.shared.commands
    }

    /// Granted regions available for new channels.
    #[must_use]
    pub fn free_ring_refs(&self) -> usize {
        self.shared
            .count_refs(|state| matches!(state, RefState::Free))
    }

    /// Granted regions retired after a timeout.
    #[must_use]
    pub fn quarantined_ring_refs(&self) -> usize {
        self.shared
            .count_refs(|state| matches!(state, RefState::Quarantined(_)))
    }

    /// Hand back quarantined regions whose close has been answered.
    ///
    /// Polls the command ring first. `Ok` and `NotFound` both prove the
    /// multiplexer dropped the region. Returns the number freed. Every
    /// open runs this before claiming a region.
    pub fn reclaim_ring_refs(&self) -> usize {
        self.shared.reclaim()
    }

    /// Open a channel with the configured timeout.
    pub fn open(
        &self,
        local: LocalAddress,
        remote: RemoteDescriptor,
    ) -> Result<Channel<P>, OpenError> {
        self.open_with_timeout(local, remote, self.shared.config.open_timeout_ns)
    }

    /// Open a channel from `local` to `remote`, waiting at most `timeout_ns`.
    ///
    /// Fails with `Busy` straight away if no granted region or command slot
    /// is free. A timed-out open leaves its region quarantined.
    pub fn open_with_timeout(
        &self,
        local: LocalAddress,
        remote: RemoteDescriptor,
        timeout_ns: u64,
    ) -> Result<Channel<P>, OpenError> {
        let shared = &self.shared;
        shared.reclaim();
        let ring_ref = shared.claim_ref().ok_or(OpenError::Busy)?;
        let order = shared.config.ring_order;

        let ring = shared
            .grants
            .get(ring_ref)
            .ok_or(OpenError::Rejected)
            .and_then(|region| {
                DataRing::create(region, order, Side::Front, Arc::clone(&shared.doorbell)).map_err(
                    |err| {
                        warn!(ring_ref = ring_ref.as_u32(), %err, "cannot create data ring");
                        OpenError::Rejected
                    },
                )
            });
        let ring = match ring {
            Ok(ring) => ring,
            Err(err) => {
                shared.release_ref(ring_ref);
                return Err(err);
            }
        };

        let request = OpenRequest {
            local_address: local,
            remote,
            ring_order: u8::try_from(order).unwrap_or(u8::MAX),
            ring_ref,
        }
        .to_request();
        let mut channel = Channel::opening(Arc::clone(shared), local, remote, ring_ref, ring);

        match shared.commands.call(&shared.platform, &request, timeout_ns) {
            Ok(response) if response.status.is_ok() => {
                let max_payload = OpenResponse::from_params(&response.params)
                    .and_then(|open| usize::try_from(open.max_payload).ok())
                    .map_or(MAX_DATAGRAM_PAYLOAD, |max| max.min(MAX_DATAGRAM_PAYLOAD));
                channel.mark_open(max_payload);
                debug!(%local, %remote, ring_ref = ring_ref.as_u32(), "channel open");
                Ok(channel)
            }
            Ok(response) => {
                debug!(%local, %remote, status = %response.status, "open refused");
                channel.abandon(false);
                Err(OpenError::from_status(response.status))
            }
            Err(err) => {
                warn!(%local, %remote, %err, "open failed");
                // A request that never made it into the ring cannot be acted on
                channel.abandon(err != CallError::Full);
                Err(err.into())
            }
        }
    }
}

impl<P: Platform> fmt::Debug for Frontend<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frontend")
            .field("config", &self.shared.config)
            .field("commands", &self.shared.commands)
            .field("refs", &*self.shared.refs.lock())
            .finish_non_exhaustive()
    }
}
