// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Scripted stand-in for the multiplexer, driven from the platform's relax hook.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::vec::Vec;

use xmbox_abi::constants::MAX_DATAGRAM_PAYLOAD;
use xmbox_abi::layout::data_ring;
use xmbox_abi::{
    CloseRequest, CommandKind, LocalAddress, OpenRequest, OpenResponse, Request, Response,
    ResultCode,
};
use xmbox_transport::platform::{MockPlatform, NullDoorbell};
use xmbox_transport::{
    CommandClient, CommandRingLayout, CommandServer, DataRing, GrantTable, SharedRegion, Side,
};

use crate::config::ChannelConfig;
use crate::frontend::Frontend;

/// How the peer answers open requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    /// Attach the ring and answer `Ok`.
    Accept,
    /// Answer with this status and attach nothing.
    Status(ResultCode),
    /// Never look at the command ring.
    Silent,
}

pub(crate) struct FakePeer {
    server: CommandServer,
    pub(crate) grants: GrantTable,
    pub(crate) reply: Reply,
    /// Privileged ends of the attached rings.
    pub(crate) rings: Vec<(LocalAddress, DataRing)>,
    pub(crate) requests: Vec<Request>,
}

impl FakePeer {
    pub(crate) fn step(&mut self) {
        if self.reply == Reply::Silent {
            return;
        }
        let Self {
            server,
            grants,
            reply,
            rings,
            requests,
        } = self;
        server
            .process(|request| {
                requests.push(*request);
                answer(*reply, grants, rings, request)
            })
            .unwrap();
    }

    pub(crate) fn ring(&mut self, local: u8) -> &mut DataRing {
        self.rings
            .iter_mut()
            .find(|(address, _)| address.as_u8() == local)
            .map(|(_, ring)| ring)
            .expect("no ring attached at address")
    }
}

fn answer(
    reply: Reply,
    grants: &GrantTable,
    rings: &mut Vec<(LocalAddress, DataRing)>,
    request: &Request,
) -> Response {
    match request.command {
        CommandKind::OpenChannel => {
            if let Reply::Status(status) = reply {
                return Response::status(status);
            }
            let open = OpenRequest::from_params(&request.params).unwrap();
            let region = grants.get(open.ring_ref).unwrap();
            let ring = DataRing::attach(
                region,
                Side::Back,
                u32::from(open.ring_order),
                Arc::new(NullDoorbell),
            )
            .unwrap();
            rings.push((open.local_address, ring));
            OpenResponse {
                max_payload: u32::try_from(MAX_DATAGRAM_PAYLOAD).unwrap(),
            }
            .to_response()
        }
        CommandKind::CloseChannel => {
            let close = CloseRequest::from_params(&request.params).unwrap();
            let before = rings.len();
            rings.retain(|(address, _)| *address != close.local_address);
            if rings.len() < before {
                Response::status(ResultCode::Ok)
            } else {
                Response::status(ResultCode::NotFound)
            }
        }
    }
}

pub(crate) struct Harness {
    pub(crate) platform: Arc<MockPlatform>,
    pub(crate) peer: Arc<spin::Mutex<FakePeer>>,
    pub(crate) frontend: Frontend<Arc<MockPlatform>>,
}

/// Frontend with `refs` granted regions, answered by a fake peer.
pub(crate) fn harness(config: ChannelConfig, refs: usize, reply: Reply) -> Harness {
    let layout = CommandRingLayout::DEFAULT;
    let region = Arc::new(SharedRegion::new_zeroed(layout.region_size()));
    let client = CommandClient::create(Arc::clone(&region), layout, Arc::new(NullDoorbell)).unwrap();
    let server = CommandServer::attach(region, Arc::new(NullDoorbell)).unwrap();
    let grants = GrantTable::with_regions(refs, data_ring::region_size(config.ring_order));

    let peer = Arc::new(spin::Mutex::new(FakePeer {
        server,
        grants: grants.clone(),
        reply,
        rings: Vec::new(),
        requests: Vec::new(),
    }));
    let platform = Arc::new(MockPlatform::new());
    let hook_peer = Arc::clone(&peer);
    platform.on_relax(move || hook_peer.lock().step());

    let frontend = Frontend::new(
        Arc::clone(&platform),
        client,
        grants,
        Arc::new(NullDoorbell),
        config,
    );
    Harness {
        platform,
        peer,
        frontend,
    }
}
