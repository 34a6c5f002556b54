// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for end-to-end tests.
//!
//! This module provides:
//! - [`System`] - a multiplexer over emulated mailbox hardware, serviced
//!   whenever a client backs off on the mock platform
//! - [`System::attach`] - a client [`Frontend`] for a fresh domain
//!
//! # Design
//!
//! This module is **not** a test file, so it must comply with full clippy rules.
//! Fallible setup returns [`SetupError`]; the test files unwrap.

#![allow(unused_imports, reason = "re-exports used by some test files only")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::vec::Vec;

use xmbox_abi::layout::data_ring;
use xmbox_abi::{
    DatagramHeader, DatagramKind, DomainId, LocalAddress, RemoteDescriptor, RemoteProcessorId,
};
use xmbox_channel::{ChannelConfig, Frontend};
use xmbox_mux::{MuxConfig, MuxError, Multiplexer, ServiceReport};
use xmbox_transport::platform::{MockPlatform, NullDoorbell};
use xmbox_transport::slot::MockMailbox;
use xmbox_transport::{
    CommandClient, CommandRingLayout, GrantTable, RingError, SharedRegion, SlotEngine,
    SlotEngineConfig,
};

pub use xmbox_transport::platform::Platform;

/// Multiplexer type driven by the emulated hardware.
pub type TestMux = Multiplexer<Arc<MockMailbox>>;

/// Frontend type sharing the system's clock.
pub type TestFrontend = Frontend<Arc<MockPlatform>>;

/// Why a test fixture could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// The command ring could not be formatted.
    Ring(RingError),
    /// The multiplexer refused the domain.
    Mux(MuxError),
}

impl From<RingError> for SetupError {
    fn from(err: RingError) -> Self {
        Self::Ring(err)
    }
}

impl From<MuxError> for SetupError {
    fn from(err: MuxError) -> Self {
        Self::Mux(err)
    }
}

/// Multiplexer, hardware and clock of one simulated system.
pub struct System {
    /// Clock shared by every frontend of the system.
    pub platform: Arc<MockPlatform>,
    /// Emulated slot hardware; sends complete immediately.
    pub mailbox: Arc<MockMailbox>,
    /// The multiplexer, serviced on every relax while not paused.
    pub mux: Arc<spin::Mutex<TestMux>>,
    paused: Arc<AtomicBool>,
}

impl System {
    /// Build a system with two attached remote processors.
    #[must_use]
    pub fn new(config: MuxConfig) -> Self {
        let mailbox = Arc::new(MockMailbox::new());
        mailbox.set_auto_complete(true);
        let engine = SlotEngine::new(Arc::clone(&mailbox), SlotEngineConfig::new().with_remotes(2));
        let mux = Arc::new(spin::Mutex::new(Multiplexer::new(engine, config)));
        let paused = Arc::new(AtomicBool::new(false));

        let platform = Arc::new(MockPlatform::new());
        let serviced = Arc::clone(&mux);
        let gate = Arc::clone(&paused);
        platform.on_relax(move || {
            if !gate.load(Ordering::SeqCst) {
                serviced.lock().service();
            }
        });

        Self {
            platform,
            mailbox,
            mux,
            paused,
        }
    }

    /// Attach domain `id` with `refs` granted regions sized for `config`.
    pub fn attach(
        &self,
        id: u8,
        refs: usize,
        config: ChannelConfig,
    ) -> Result<TestFrontend, SetupError> {
        let layout = CommandRingLayout::DEFAULT;
        let region = Arc::new(SharedRegion::new_zeroed(layout.region_size()));
        let client = CommandClient::create(Arc::clone(&region), layout, Arc::new(NullDoorbell))?;
        let grants = GrantTable::with_regions(refs, data_ring::region_size(config.ring_order));
        self.mux.lock().add_domain(
            DomainId::new(id),
            region,
            grants.clone(),
            Arc::new(NullDoorbell),
        )?;
        Ok(Frontend::new(
            Arc::clone(&self.platform),
            client,
            grants,
            Arc::new(NullDoorbell),
            config,
        ))
    }

    /// Stop or resume servicing the multiplexer on relax.
    pub fn pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Run one service pass by hand.
    pub fn service(&self) -> ServiceReport {
        self.mux.lock().service()
    }
}

/// Descriptor of `address` on remote processor `processor`.
#[must_use]
pub fn remote(processor: u8, address: u8) -> Option<RemoteDescriptor> {
    RemoteProcessorId::new(processor)
        .map(|id| RemoteDescriptor::new(id, LocalAddress::new(address)))
}

/// Wire bytes of a data datagram.
#[must_use]
pub fn datagram(origin: u8, source: u8, destination: u8, payload: &[u8]) -> Vec<u8> {
    let header = DatagramHeader::new(
        origin,
        LocalAddress::new(source),
        LocalAddress::new(destination),
        DatagramKind::Data,
    );
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}
