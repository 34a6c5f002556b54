// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host simulation of the xmbox mailbox stack.
//!
//! Runs the whole stack on one machine:
//! - a multiplexer thread servicing the emulated slot hardware and every
//!   attached domain's command and data rings
//! - one client thread per domain, opening a channel and sending datagrams
//! - a remote processor thread echoing each datagram back with source and
//!   destination swapped
//!
//! Every client checks that what comes back is what it sent.
//!
//! # Usage
//!
//! ```bash
//! # 4 KiB rings, 100 datagrams per domain
//! xmbox-sim
//!
//! # 1 KiB rings, 500 datagrams per domain, with routing decisions logged
//! RUST_LOG=xmbox_mux=debug xmbox-sim 10 500
//! ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use std::vec::Vec;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use xmbox_abi::layout::data_ring;
use xmbox_abi::{DatagramHeader, DomainId, LocalAddress, RemoteDescriptor, RemoteProcessorId};
use xmbox_channel::{ChannelConfig, Frontend};
use xmbox_mux::{MuxConfig, Multiplexer};
use xmbox_transport::platform::{NullDoorbell, StdPlatform};
use xmbox_transport::slot::{MockMailbox, SentFrame};
use xmbox_transport::{
    CommandClient, CommandRingLayout, GrantTable, SharedRegion, SlotEngine, SlotEngineConfig,
};

/// Domains attached to the multiplexer.
const DOMAINS: [u8; 2] = [1, 2];

/// Remote processor every channel talks to.
const ECHO_PROCESSOR: u8 = 1;

/// Deadline for one echo to come back.
const ECHO_TIMEOUT_NS: u64 = 2_000_000_000;

/// Command line settings.
#[derive(Debug, Clone, Copy)]
struct Settings {
    ring_order: u32,
    messages: usize,
}

impl Settings {
    fn parse(args: &[String]) -> Result<Self, String> {
        let ring_order = match args.get(1) {
            Some(arg) => arg
                .parse()
                .map_err(|_| format!("invalid ring order: {arg}"))?,
            None => 12,
        };
        let messages = match args.get(2) {
            Some(arg) => arg
                .parse()
                .map_err(|_| format!("invalid message count: {arg}"))?,
            None => 100,
        };
        Ok(Self {
            ring_order,
            messages,
        })
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let settings = match Settings::parse(&args) {
        Ok(settings) => settings,
        Err(err) => {
            error!(%err, "usage: xmbox-sim [ring-order] [messages]");
            return ExitCode::FAILURE;
        }
    };

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: Settings) -> Result<(), String> {
    let channel_config = ChannelConfig::new().with_ring_order(settings.ring_order);
    let mux_config = MuxConfig::new().with_max_ring_order(channel_config.ring_order.max(12));
    info!(
        version = xmbox_transport::VERSION,
        ring_order = channel_config.ring_order,
        messages = settings.messages,
        "starting simulation"
    );

    let mailbox = Arc::new(MockMailbox::new());
    mailbox.set_auto_complete(true);
    let engine = SlotEngine::new(Arc::clone(&mailbox), SlotEngineConfig::new());
    let mut mux = Multiplexer::new(engine, mux_config);
    mux.set_default_handler(|inbound| {
        warn!(header = %inbound.header, len = inbound.bytes.len(), "unrouted datagram");
    });

    let mut frontends = Vec::new();
    for id in DOMAINS {
        let layout = CommandRingLayout::DEFAULT;
        let region = Arc::new(SharedRegion::new_zeroed(layout.region_size()));
        let client = CommandClient::create(Arc::clone(&region), layout, Arc::new(NullDoorbell))
            .map_err(|err| format!("command ring of domain {id}: {err}"))?;
        let grants = GrantTable::with_regions(2, data_ring::region_size(channel_config.ring_order));
        mux.add_domain(DomainId::new(id), region, grants.clone(), Arc::new(NullDoorbell))
            .map_err(|err| format!("domain {id}: {err}"))?;
        let frontend = Frontend::new(
            StdPlatform::new(),
            client,
            grants,
            Arc::new(NullDoorbell),
            channel_config,
        );
        frontends.push((id, frontend));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mux_thread = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if mux.service().is_idle() {
                    thread::yield_now();
                }
            }
            info!(stats = ?mux.stats(), "multiplexer stopped");
        })
    };
    let remote_thread = {
        let stop = Arc::clone(&stop);
        let mailbox = Arc::clone(&mailbox);
        thread::spawn(move || echo_remote(&mailbox, &stop))
    };

    let clients: Vec<_> = frontends
        .into_iter()
        .map(|(id, frontend)| {
            let messages = settings.messages;
            thread::spawn(move || run_client(id, &frontend, messages))
        })
        .collect();

    let mut result = Ok(());
    for client in clients {
        let outcome = match client.join() {
            Ok(outcome) => outcome,
            Err(_) => Err(String::from("client thread panicked")),
        };
        if result.is_ok() {
            result = outcome;
        }
    }

    stop.store(true, Ordering::Relaxed);
    if mux_thread.join().is_err() || remote_thread.join().is_err() {
        return Err(String::from("service thread panicked"));
    }
    result
}

/// Open a channel, send `messages` datagrams and check every echo.
fn run_client(id: u8, frontend: &Frontend<StdPlatform>, messages: usize) -> Result<(), String> {
    let processor = RemoteProcessorId::new(ECHO_PROCESSOR)
        .ok_or_else(|| String::from("echo processor out of range"))?;
    let local = LocalAddress::new(id + 4);
    let remote = RemoteDescriptor::new(processor, LocalAddress::new(9));
    let mut channel = frontend
        .open(local, remote)
        .map_err(|err| format!("domain {id}: open: {err}"))?;
    info!(domain = id, %local, %remote, max_payload = channel.max_payload(), "channel open");

    for index in 0..messages {
        let payload = message(id, index, channel.max_payload());
        loop {
            match channel.send(&payload) {
                Ok(_) => break,
                Err(xmbox_channel::SendError::Busy) => thread::yield_now(),
                Err(err) => return Err(format!("domain {id}: send {index}: {err}")),
            }
        }
        while !channel
            .flush()
            .map_err(|err| format!("domain {id}: flush {index}: {err}"))?
        {
            thread::yield_now();
        }
        match channel.recv(ECHO_TIMEOUT_NS) {
            Some(echo) if echo == payload => {
                debug!(domain = id, index, len = payload.len(), "echo ok");
            }
            Some(echo) => {
                return Err(format!(
                    "domain {id}: echo {index} mismatch ({} bytes, expected {})",
                    echo.len(),
                    payload.len()
                ));
            }
            None => return Err(format!("domain {id}: echo {index} timed out")),
        }
    }

    info!(domain = id, messages, "all echoes verified");
    channel.close();
    Ok(())
}

/// Deterministic payload whose length sweeps up to `max`.
fn message(id: u8, index: usize, max: usize) -> Vec<u8> {
    let len = (index * 97 + usize::from(id) * 13) % (max + 1);
    (0..len)
        .map(|offset| u8::try_from((offset + index) % 251).unwrap_or(0) ^ id)
        .collect()
}

/// Reflect every transmitted datagram back from the processor it was sent to.
fn echo_remote(mailbox: &MockMailbox, stop: &AtomicBool) {
    let mut backlog: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut next_slot = 0;
    while !stop.load(Ordering::Relaxed) {
        for frame in mailbox.take_sent() {
            if let Some(reply) = reflect(&frame) {
                backlog.push(reply);
            }
        }
        // A receive slot stays busy until the multiplexer acknowledges it
        backlog.retain(|(remote, bytes)| {
            for _ in 0..xmbox_abi::constants::SLOTS_PER_REMOTE {
                next_slot = (next_slot + 1) % xmbox_abi::constants::SLOTS_PER_REMOTE;
                if mailbox.inject(*remote, next_slot, bytes) {
                    return false;
                }
            }
            true
        });
        if backlog.is_empty() {
            thread::sleep(Duration::from_micros(50));
        } else {
            thread::yield_now();
        }
    }
}

/// Swap source and destination of a sent datagram, stamped with the remote's origin.
fn reflect(frame: &SentFrame) -> Option<(usize, Vec<u8>)> {
    let processor = u8::try_from(frame.target_mask.trailing_zeros()).ok()?;
    let (header, payload) = DatagramHeader::split(&frame.bytes)?;
    let reply = DatagramHeader::new(processor, header.destination, header.source, header.kind);

    let mut bytes = reply.to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    Some((usize::from(processor), bytes))
}
