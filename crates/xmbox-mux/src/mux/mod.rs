// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The domain multiplexer.
//!
//! One [`Multiplexer`] owns the physical slot engine and serves every
//! attached domain. Work happens in [`Multiplexer::service`], which the host
//! calls from its receive interrupt bottom half or a polling loop:
//!
//! 1. Demultiplex pending receive buffers through the routing table
//! 2. Reap detached transmit slots, bounded by the reap quota
//! 3. Answer each domain's command ring
//! 4. Forward frames the domains queued on their data rings
//!
//! Reaping is its own step so receive dispatch and send reclamation can be
//! driven and tested separately.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use tracing::{debug, info, trace, warn};
use xmbox_abi::constants::MAX_DATAGRAM_PAYLOAD;
use xmbox_abi::{
    CloseRequest, CommandKind, DatagramHeader, DatagramKind, DomainId, LocalAddress, OpenRequest,
    OpenResponse, RemoteDescriptor, RemoteProcessorId, Request, Response, ResultCode,
};
use xmbox_transport::platform::Doorbell;
use xmbox_transport::{
    CommandServer, DataRing, GrantTable, Inbound, MailboxRegs, QueueReceiver, RingError,
    SharedRegion, Side, SlotEngine, SlotError, bounded,
};

use crate::config::MuxConfig;
use crate::routing::{ChannelPump, RouteError, RouteOutcome, RoutingTable, Sink};


/// Largest payload advertised to domains in an open reply.
const MAX_PAYLOAD: u32 = MAX_DATAGRAM_PAYLOAD as u32;

// =============================================================================
// Errors and Counters
// =============================================================================

/// Multiplexer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxError {
    /// A domain with this id is attached already.
    DomainExists,
    /// No domain with this id is attached.
    UnknownDomain,
    /// The domain's command ring could not be attached.
    Ring(RingError),
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomainExists => write!(f, "domain already attached"),
            Self::UnknownDomain => write!(f, "unknown domain"),
            Self::Ring(err) => write!(f, "command ring: {err}"),
        }
    }
}

impl From<RingError> for MuxError {
    fn from(err: RingError) -> Self {
        Self::Ring(err)
    }
}

/// Multiplexer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxStats {
    /// Datagrams handed to a channel.
    pub delivered: u64,
    /// Datagrams lost to a full channel sink.
    pub dropped: u64,
    /// Datagrams handed to a service route.
    pub service: u64,
    /// Datagrams that reached the default handler.
    pub unrouted: u64,
    /// Frames forwarded from data rings to the slot engine.
    pub forwarded: u64,
    /// Frames parked because every transmit slot was taken.
    pub stalls: u64,
    /// Frames lost to a slot engine error other than exhaustion.
    pub send_failures: u64,
}

impl MuxStats {
    fn record(&mut self, outcome: RouteOutcome) {
        match outcome {
            RouteOutcome::Delivered { .. } => self.delivered += 1,
            RouteOutcome::Dropped { .. } => self.dropped += 1,
            RouteOutcome::Service(_) => self.service += 1,
            RouteOutcome::Unrouted => self.unrouted += 1,
        }
    }
}

/// What one [`Multiplexer::service`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceReport {
    /// Receive buffers demultiplexed.
    pub received: usize,
    /// Detached transmit slots freed.
    pub reaped: usize,
    /// Command ring requests answered.
    pub commands: usize,
    /// Frames forwarded to the slot engine.
    pub frames: usize,
}

impl ServiceReport {
    /// Returns true if the pass found nothing to do.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.received == 0 && self.reaped == 0 && self.commands == 0 && self.frames == 0
    }
}

// =============================================================================
// Domain Backends
// =============================================================================

/// Privileged-side state of one attached domain.
struct DomainBackend {
    id: DomainId,
    commands: CommandServer,
    grants: GrantTable,
    doorbell: Arc<dyn Doorbell>,
    faulted: bool,
}

/// Everything a command needs, borrowed out of the multiplexer.
struct CommandContext<'a> {
    domain: DomainId,
    config: &'a MuxConfig,
    remotes: usize,
    routes: &'a mut RoutingTable,
    grants: &'a GrantTable,
    doorbell: &'a Arc<dyn Doorbell>,
}

impl CommandContext<'_> {
    fn handle(&mut self, request: &Request) -> Response {
        match request.command {
            CommandKind::OpenChannel => OpenRequest::from_params(&request.params)
                .map_or(Response::status(ResultCode::Invalid), |open| self.open(&open)),
            CommandKind::CloseChannel => CloseRequest::from_params(&request.params)
                .map_or(Response::status(ResultCode::Invalid), |close| self.close(&close)),
        }
    }

    fn open(&mut self, request: &OpenRequest) -> Response {
        let domain = self.domain;
        let address = request.local_address;
        let order = u32::from(request.ring_order);

        if order > self.config.max_ring_order {
            debug!(%domain, %address, order, max = self.config.max_ring_order, "ring order too large");
            return Response::status(ResultCode::Rejected);
        }
        if request.remote.processor.index() >= self.remotes {
            debug!(%domain, %address, remote = %request.remote, "remote processor not attached");
            return Response::status(ResultCode::Rejected);
        }
        if self.routes.contains(domain, address) {
            return Response::status(ResultCode::AlreadyExists);
        }

        let Some(region) = self.grants.get(request.ring_ref) else {
            debug!(%domain, ring_ref = request.ring_ref.as_u32(), "ring reference not granted");
            return Response::status(ResultCode::Rejected);
        };
        let ring = match DataRing::attach(
            region,
            Side::Back,
            self.config.max_ring_order,
            Arc::clone(self.doorbell),
        ) {
            Ok(ring) if ring.order() == order => ring,
            Ok(ring) => {
                debug!(%domain, requested = order, published = ring.order(), "ring order mismatch");
                return Response::status(ResultCode::Rejected);
            }
            Err(err) => {
                debug!(%domain, %err, "data ring attach failed");
                return Response::status(ResultCode::Rejected);
            }
        };

        match self.routes.register_channel(
            domain,
            address,
            request.remote,
            Sink::Ring(ChannelPump::new(ring)),
        ) {
            Ok(()) => {
                info!(%domain, %address, remote = %request.remote, order, "channel opened");
                OpenResponse {
                    max_payload: MAX_PAYLOAD,
                }
                .to_response()
            }
            Err(RouteError::AlreadyExists) => Response::status(ResultCode::AlreadyExists),
            Err(RouteError::Conflict) => Response::status(ResultCode::Rejected),
            Err(RouteError::TableFull) => Response::status(ResultCode::Busy),
            Err(RouteError::NotFound) => Response::status(ResultCode::Invalid),
        }
    }

    fn close(&mut self, request: &CloseRequest) -> Response {
        match self.routes.unregister_channel(self.domain, request.local_address) {
            Ok(()) => {
                info!(domain = %self.domain, address = %request.local_address, "channel closed");
                Response::status(ResultCode::Ok)
            }
            Err(_) => Response::status(ResultCode::NotFound),
        }
    }
}

/// Send one frame from `source` to `remote` on a freshly allocated slot.
///
/// The slot goes to the reaper once the hardware has it.
fn forward<R: MailboxRegs>(
    engine: &SlotEngine<R>,
    origin: u8,
    source: LocalAddress,
    remote: RemoteDescriptor,
    body: &[u8],
) -> Result<(), SlotError> {
    let header = DatagramHeader::new(origin, source, remote.address, DatagramKind::Data);
    let handle = engine.allocate_slot(None, false)?;
    if let Err(err) = engine.send_datagram(&handle, remote.processor, header, body) {
        // A hardware fault already freed the slot; this is a no-op then
        let _ = engine.free_slot(handle);
        return Err(err);
    }
    engine.release_after_send(handle)
}

// =============================================================================
// Multiplexer
// =============================================================================

/// The privileged side of the mailbox.
pub struct Multiplexer<R: MailboxRegs> {
    engine: SlotEngine<R>,
    config: MuxConfig,
    routes: RoutingTable,
    domains: Vec<DomainBackend>,
    default_handler: Box<dyn FnMut(Inbound) + Send>,
    stats: MuxStats,
}

impl<R: MailboxRegs> Multiplexer<R> {
    /// Take ownership of the slot engine. Unrouted datagrams are dropped
    /// until a default handler is installed.
    pub fn new(engine: SlotEngine<R>, config: MuxConfig) -> Self {
        Self {
            engine,
            routes: RoutingTable::new(config.max_routes),
            config,
            domains: Vec::new(),
            default_handler: Box::new(|inbound: Inbound| {
                trace!(header = %inbound.header, "unrouted datagram dropped");
            }),
            stats: MuxStats::default(),
        }
    }

    /// Install the handler for datagrams no route claims.
    pub fn set_default_handler(&mut self, handler: impl FnMut(Inbound) + Send + 'static) {
        self.default_handler = Box::new(handler);
    }

    /// The slot engine.
    #[must_use]
    pub const fn engine(&self) -> &SlotEngine<R> {
        &self.engine
    }

    /// The routing table.
    #[must_use]
    pub const fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Counters since creation.
    #[must_use]
    pub const fn stats(&self) -> MuxStats {
        self.stats
    }

    // -------------------------------------------------------------------------
    // Domains
    // -------------------------------------------------------------------------

    /// Attach a domain through the command ring it created in `command_region`.
    ///
    /// `grants` holds the regions the domain may pass as data rings, and
    /// `doorbell` notifies the domain.
    pub fn add_domain(
        &mut self,
        id: DomainId,
        command_region: Arc<SharedRegion>,
        grants: GrantTable,
        doorbell: Arc<dyn Doorbell>,
    ) -> Result<(), MuxError> {
        if self.domains.iter().any(|backend| backend.id == id) {
            return Err(MuxError::DomainExists);
        }
        let commands = CommandServer::attach(command_region, Arc::clone(&doorbell))?;
        self.domains.push(DomainBackend {
            id,
            commands,
            grants,
            doorbell,
            faulted: false,
        });
        info!(domain = %id, "domain attached");
        Ok(())
    }

    /// Detach a domain and destroy all of its channels. Returns how many
    /// channels were destroyed.
    pub fn remove_domain(&mut self, id: DomainId) -> Result<usize, MuxError> {
        let index = self
            .domains
            .iter()
            .position(|backend| backend.id == id)
            .ok_or(MuxError::UnknownDomain)?;
        self.domains.swap_remove(index);
        let removed = self.routes.remove_domain(id);
        info!(domain = %id, channels = removed, "domain detached");
        Ok(removed)
    }

    /// Number of attached domains.
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    // -------------------------------------------------------------------------
    // Routes
    // -------------------------------------------------------------------------

    /// Register a channel whose datagrams a privileged-side task consumes.
    pub fn register_channel(
        &mut self,
        domain: DomainId,
        address: LocalAddress,
        remote: RemoteDescriptor,
    ) -> Result<QueueReceiver, RouteError> {
        let (sender, receiver) = bounded(self.config.queue_depth);
        self.routes
            .register_channel(domain, address, remote, Sink::Queue(sender))?;
        Ok(receiver)
    }

    /// Remove a channel of any kind.
    pub fn unregister_channel(
        &mut self,
        domain: DomainId,
        address: LocalAddress,
    ) -> Result<(), RouteError> {
        self.routes.unregister_channel(domain, address)
    }

    /// Register the service route of `processor`.
    pub fn register_service(
        &mut self,
        processor: RemoteProcessorId,
    ) -> Result<QueueReceiver, RouteError> {
        let (sender, receiver) = bounded(self.config.queue_depth);
        self.routes.register_service(processor, sender)?;
        Ok(receiver)
    }

    /// Remove the service route of `processor`.
    pub fn unregister_service(&mut self, processor: RemoteProcessorId) -> Result<(), RouteError> {
        self.routes.unregister_service(processor)
    }

    /// Route one datagram as if it had just been received.
    pub fn route_inbound(&mut self, inbound: Inbound) -> RouteOutcome {
        let outcome = self
            .routes
            .route_inbound(inbound, &mut *self.default_handler);
        self.stats.record(outcome);
        outcome
    }

    /// Execute one command on behalf of `domain`.
    ///
    /// Requests from an unknown domain are answered with `Invalid`.
    pub fn handle_command(&mut self, domain: DomainId, request: &Request) -> Response {
        let remotes = self.engine.config().remotes;
        let Some(backend) = self.domains.iter().find(|backend| backend.id == domain) else {
            return Response::status(ResultCode::Invalid);
        };
        CommandContext {
            domain,
            config: &self.config,
            remotes,
            routes: &mut self.routes,
            grants: &backend.grants,
            doorbell: &backend.doorbell,
        }
        .handle(request)
    }

    // -------------------------------------------------------------------------
    // Service Loop
    // -------------------------------------------------------------------------

    /// Run one pass over all pending work.
    pub fn service(&mut self) -> ServiceReport {
        let received = self.receive();
        let reaped = self.reap();
        let commands = self.process_commands();
        self.routes.remove_faulted();
        let frames = self.pump_outbound();
        ServiceReport {
            received,
            reaped,
            commands,
            frames,
        }
    }

    /// Demultiplex every pending receive buffer through the routing table.
    pub fn receive(&mut self) -> usize {
        let Self {
            engine,
            routes,
            default_handler,
            stats,
            ..
        } = self;
        engine.on_receive_interrupt(&mut |inbound| {
            stats.record(routes.route_inbound(inbound, &mut **default_handler));
        })
    }

    /// Free finished detached sends, bounded by the reap quota.
    pub fn reap(&mut self) -> usize {
        self.engine.reap(self.config.reap_quota)
    }

    /// Answer every domain's queued commands.
    pub fn process_commands(&mut self) -> usize {
        let remotes = self.engine.config().remotes;
        let Self {
            config,
            routes,
            domains,
            ..
        } = self;

        let mut handled = 0;
        for backend in domains.iter_mut().filter(|backend| !backend.faulted) {
            let DomainBackend {
                id,
                commands,
                grants,
                doorbell,
                faulted,
            } = backend;
            let mut context = CommandContext {
                domain: *id,
                config: &*config,
                remotes,
                routes: &mut *routes,
                grants: &*grants,
                doorbell: &*doorbell,
            };
            match commands.process(|request| context.handle(request)) {
                Ok(count) => handled += count,
                Err(err) => {
                    warn!(domain = %id, %err, "command ring unusable, domain no longer served");
                    *faulted = true;
                }
            }
        }
        handled
    }

    /// Forward frames queued on the domains' data rings.
    ///
    /// Each channel forwards at most `pump_budget` frames per pass. When the
    /// slot pool is exhausted the frame is parked on its channel and retried
    /// first on the next pass.
    pub fn pump_outbound(&mut self) -> usize {
        let Self {
            engine,
            config,
            routes,
            stats,
            ..
        } = self;

        let mut sent = 0;
        for entry in routes.entries_mut() {
            let Sink::Ring(pump) = &mut entry.sink else {
                continue;
            };
            for _ in 0..config.pump_budget {
                let Some(frame) = pump.next_outbound() else {
                    break;
                };
                match forward(engine, config.local_origin, entry.address, entry.remote, &frame) {
                    Ok(()) => {
                        trace!(domain = %entry.domain, address = %entry.address, len = frame.len(), "frame forwarded");
                        stats.forwarded += 1;
                        sent += 1;
                    }
                    Err(SlotError::Busy) => {
                        pump.stall(frame);
                        stats.stalls += 1;
                        break;
                    }
                    Err(err) => {
                        warn!(domain = %entry.domain, address = %entry.address, %err, "frame dropped");
                        stats.send_failures += 1;
                    }
                }
            }
        }
        sent
    }
}

impl<R: MailboxRegs> fmt::Debug for Multiplexer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiplexer")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .field("domains", &self.domains.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
