// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The routing table.
//!
//! Channel routes map a `(domain, local address)` pair to the transport
//! instance carrying that channel. Service routes map a bare processor to a
//! queue, for system services whose datagrams carry no fixed address.
//! Counts are small and bounded, so every lookup is a linear scan.

use alloc::vec::Vec;
use core::fmt;

use tracing::{debug, trace, warn};
use xmbox_abi::constants::MAX_DATAGRAM_PAYLOAD;
use xmbox_abi::{DomainId, LocalAddress, RemoteDescriptor, RemoteProcessorId};
use xmbox_transport::ring::encode_prefix;
use xmbox_transport::{DataRing, FrameAssembler, Inbound, QueueSender};


/// Routing table errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// A route for this key exists already.
    AlreadyExists,
    /// Another domain owns a channel with the same wire address.
    Conflict,
    /// No route matched.
    NotFound,
    /// The table holds its configured maximum.
    TableFull,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "route already exists"),
            Self::Conflict => write!(f, "wire address owned by another domain"),
            Self::NotFound => write!(f, "route not found"),
            Self::TableFull => write!(f, "routing table full"),
        }
    }
}

/// Data ring end of a domain's channel, with its framing state.
pub struct ChannelPump {
    ring: DataRing,
    assembler: FrameAssembler,
    /// Outbound frame waiting for a free transmit slot.
    stalled: Option<Vec<u8>>,
}

impl ChannelPump {
    /// Wrap the privileged end of a channel's data ring.
    #[must_use]
    pub const fn new(ring: DataRing) -> Self {
        Self {
            ring,
            assembler: FrameAssembler::new(MAX_DATAGRAM_PAYLOAD),
            stalled: None,
        }
    }

    /// Frame `payload` into the ring if the whole frame fits.
    fn deliver(&mut self, payload: &[u8]) -> bool {
        let Some(prefix) = encode_prefix(payload.len()) else {
            return false;
        };
        let fits = self
            .ring
            .writable()
            .is_ok_and(|free| free >= prefix.len() + payload.len());
        fits && self.ring.write(&prefix).is_ok() && self.ring.write(payload).is_ok()
    }

    /// Next frame the domain wants sent: a stalled one first, then the ring.
    pub(crate) fn next_outbound(&mut self) -> Option<Vec<u8>> {
        if let Some(frame) = self.stalled.take() {
            return Some(frame);
        }
        match self.assembler.pump(&mut self.ring) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, "channel ring unusable");
                None
            }
        }
    }

    /// Park a frame until a transmit slot frees up.
    pub(crate) fn stall(&mut self, frame: Vec<u8>) {
        self.stalled = Some(frame);
    }

    /// Returns true while a frame waits for a slot.
    #[must_use]
    pub const fn is_stalled(&self) -> bool {
        self.stalled.is_some()
    }

    /// Fault the ring so the client stops using it.
    pub(crate) fn shut_down(&mut self) {
        self.ring.set_fault();
    }

    /// Returns true once either side faulted the ring.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.ring.is_faulted()
    }
}

impl fmt::Debug for ChannelPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPump")
            .field("ring", &self.ring)
            .field("stalled", &self.stalled.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

/// Where a channel's inbound datagrams go.
#[derive(Debug)]
pub enum Sink {
    /// A domain's data ring.
    Ring(ChannelPump),
    /// A queue drained by a task on the privileged side.
    Queue(QueueSender),
}

/// One channel route.
#[derive(Debug)]
pub struct RoutingEntry {
    /// Owning domain.
    pub domain: DomainId,
    /// Channel address within the domain.
    pub address: LocalAddress,
    /// Far end of the channel.
    pub remote: RemoteDescriptor,
    /// Transport instance.
    pub sink: Sink,
}

impl RoutingEntry {
    fn accepts(&self, origin: u8, source: LocalAddress, destination: LocalAddress) -> bool {
        self.remote.processor.as_u8() == origin
            && self.remote.address == source
            && self.address == destination
    }

    /// Inbound traffic for `other` would also land here.
    fn shares_wire_key(&self, address: LocalAddress, other: RemoteDescriptor) -> bool {
        self.accepts(other.processor.as_u8(), other.address, address)
    }
}

#[derive(Debug)]
struct ServiceRoute {
    processor: RemoteProcessorId,
    queue: QueueSender,
}

/// What [`RoutingTable::route_inbound`] did with a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to a channel.
    Delivered {
        /// Owning domain.
        domain: DomainId,
        /// Channel address.
        address: LocalAddress,
    },
    /// Matched a channel whose sink had no room.
    Dropped {
        /// Owning domain.
        domain: DomainId,
        /// Channel address.
        address: LocalAddress,
    },
    /// Handed to a processor's service route.
    Service(RemoteProcessorId),
    /// Nothing matched; the default handler got it.
    Unrouted,
}

/// The routing table.
#[derive(Debug)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
    services: Vec<ServiceRoute>,
    max_routes: usize,
}

impl RoutingTable {
    /// Create an empty table holding at most `max_routes` routes of both kinds.
    #[must_use]
    pub const fn new(max_routes: usize) -> Self {
        Self {
            entries: Vec::new(),
            services: Vec::new(),
            max_routes,
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() + self.services.len() >= self.max_routes
    }

    /// Insert a channel route. At most one route per `(domain, address)`.
    ///
    /// Datagrams carry no domain, so a wire key `(remote processor, remote
    /// address, local address)` belongs to one domain at a time.
    pub fn register_channel(
        &mut self,
        domain: DomainId,
        address: LocalAddress,
        remote: RemoteDescriptor,
        sink: Sink,
    ) -> Result<(), RouteError> {
        if self.contains(domain, address) {
            return Err(RouteError::AlreadyExists);
        }
        if let Some(owner) = self
            .entries
            .iter()
            .find(|entry| entry.shares_wire_key(address, remote))
        {
            warn!(%domain, %address, %remote, owner = %owner.domain, "wire address already routed");
            return Err(RouteError::Conflict);
        }
        if self.is_full() {
            return Err(RouteError::TableFull);
        }
        self.entries.push(RoutingEntry {
            domain,
            address,
            remote,
            sink,
        });
        debug!(%domain, %address, %remote, "channel route added");
        Ok(())
    }

    /// Remove a channel route.
    pub fn unregister_channel(
        &mut self,
        domain: DomainId,
        address: LocalAddress,
    ) -> Result<(), RouteError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.domain == domain && entry.address == address)
            .ok_or(RouteError::NotFound)?;
        let entry = self.entries.swap_remove(index);
        debug!(%domain, %address, remote = %entry.remote, "channel route removed");
        Ok(())
    }

    /// Insert a service route for datagrams that only identify their processor.
    pub fn register_service(
        &mut self,
        processor: RemoteProcessorId,
        queue: QueueSender,
    ) -> Result<(), RouteError> {
        if self.services.iter().any(|route| route.processor == processor) {
            return Err(RouteError::AlreadyExists);
        }
        if self.is_full() {
            return Err(RouteError::TableFull);
        }
        self.services.push(ServiceRoute { processor, queue });
        Ok(())
    }

    /// Remove a service route.
    pub fn unregister_service(&mut self, processor: RemoteProcessorId) -> Result<(), RouteError> {
        let index = self
            .services
            .iter()
            .position(|route| route.processor == processor)
            .ok_or(RouteError::NotFound)?;
        self.services.swap_remove(index);
        Ok(())
    }

    /// Remove every channel route of `domain`. Returns how many were removed.
    pub fn remove_domain(&mut self, domain: DomainId) -> usize {
        let before = self.entries.len();
        self.entries.retain_mut(|entry| {
            if entry.domain != domain {
                return true;
            }
            // The client sees a dead ring as a closed channel
            if let Sink::Ring(pump) = &mut entry.sink {
                pump.shut_down();
            }
            false
        });
        before - self.entries.len()
    }

    /// Remove channel routes whose data ring either side faulted.
    ///
    /// The client treats a faulted ring as a closed channel, so the address
    /// must become free for a fresh open.
    pub fn remove_faulted(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| match &entry.sink {
            Sink::Ring(pump) if pump.is_faulted() => {
                warn!(domain = %entry.domain, address = %entry.address, "data ring faulted, route removed");
                false
            }
            _ => true,
        });
        before - self.entries.len()
    }

    /// Returns true if `(domain, address)` has a route.
    #[must_use]
    pub fn contains(&self, domain: DomainId, address: LocalAddress) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.domain == domain && entry.address == address)
    }

    /// Number of channel routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no channel routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Channel routes, for pumping outbound traffic.
    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut RoutingEntry> {
        self.entries.iter_mut()
    }

    /// Route a datagram the slot engine had no local endpoint for.
    ///
    /// Exact match on the channel's `(processor, remote address, local
    /// address)` first, then the origin processor's service route, then
    /// `default`. Ring sinks receive the payload framed; queue sinks receive
    /// the datagram as received.
    pub fn route_inbound(
        &mut self,
        inbound: Inbound,
        default: &mut dyn FnMut(Inbound),
    ) -> RouteOutcome {
        let header = inbound.header;
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.accepts(header.origin, header.source, header.destination))
        {
            let (domain, address) = (entry.domain, entry.address);
            let delivered = match &mut entry.sink {
                Sink::Ring(pump) => pump.deliver(inbound.payload()),
                Sink::Queue(queue) => queue.push(inbound.bytes).is_ok(),
            };
            if delivered {
                trace!(%domain, %address, %header, "datagram delivered");
                return RouteOutcome::Delivered { domain, address };
            }
            debug!(%domain, %address, %header, "channel sink full, datagram dropped");
            return RouteOutcome::Dropped { domain, address };
        }

        if let Some(route) = self
            .services
            .iter()
            .find(|route| route.processor.as_u8() == header.origin)
        {
            let processor = route.processor;
            if route.queue.push(inbound.bytes).is_err() {
                debug!(%processor, "service queue full, datagram dropped");
            }
            return RouteOutcome::Service(processor);
        }

        // Not an error: the owner may not have registered yet
        debug!(%header, "no route for datagram");
        default(inbound);
        RouteOutcome::Unrouted
    }
}
