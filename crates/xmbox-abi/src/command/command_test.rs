// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for command ring messages.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

fn remote(processor: u8, address: u8) -> RemoteDescriptor {
    RemoteDescriptor::new(
        RemoteProcessorId::new(processor).unwrap(),
        LocalAddress::new(address),
    )
}

#[test]
fn command_kind_from_u32() {
    assert_eq!(CommandKind::from_u32(1), Some(CommandKind::OpenChannel));
    assert_eq!(CommandKind::from_u32(2), Some(CommandKind::CloseChannel));
    assert!(CommandKind::from_u32(0).is_none());
    assert!(CommandKind::from_u32(3).is_none());
}

#[test]
fn result_code_from_u32() {
    let codes = [
        ResultCode::Ok,
        ResultCode::AlreadyExists,
        ResultCode::NotFound,
        ResultCode::Rejected,
        ResultCode::Busy,
        ResultCode::Invalid,
    ];
    for code in codes {
        assert_eq!(ResultCode::from_u32(code as u32), Some(code));
    }
    assert!(ResultCode::from_u32(6).is_none());
    assert!(ResultCode::Ok.is_ok());
    assert!(!ResultCode::Rejected.is_ok());
}

#[test]
fn param_block_limits() {
    assert!(ParamBlock::from_slice(&[0; MAX_PARAM_SIZE]).is_some());
    assert!(ParamBlock::from_slice(&[0; MAX_PARAM_SIZE + 1]).is_none());

    let block = ParamBlock::from_slice(&[1, 2, 3]).unwrap();
    assert_eq!(block.as_slice(), &[1, 2, 3]);
    assert_eq!(block.len(), 3);
    assert!(ParamBlock::EMPTY.is_empty());
}

#[test]
fn open_request_encode_decode() {
    let open = OpenRequest {
        local_address: LocalAddress::new(5),
        remote: remote(1, 40),
        ring_order: 10,
        ring_ref: RingRef::new(3),
    };

    let request = open.to_request();
    assert_eq!(request.command, CommandKind::OpenChannel);
    assert_eq!(&request.params.as_slice()[..4], &[5, 1, 40, 10]);

    let decoded = OpenRequest::from_params(&request.params).unwrap();
    assert_eq!(decoded, open);
}

#[test]
fn open_request_rejects_short_block() {
    let params = ParamBlock::from_slice(&[5, 1, 40]).unwrap();
    assert!(OpenRequest::from_params(&params).is_none());
}

#[test]
fn open_request_rejects_unknown_processor() {
    let params = ParamBlock::from_slice(&[5, 200, 40, 10, 0, 0, 0, 0]).unwrap();
    assert!(OpenRequest::from_params(&params).is_none());
}

#[test]
fn open_response_encode_decode() {
    let response = OpenResponse { max_payload: 2044 }.to_response();
    assert!(response.status.is_ok());
    let decoded = OpenResponse::from_params(&response.params).unwrap();
    assert_eq!(decoded.max_payload, 2044);

    assert!(OpenResponse::from_params(&ParamBlock::EMPTY).is_none());
}

#[test]
fn close_request_encode_decode() {
    let request = CloseRequest {
        local_address: LocalAddress::new(9),
    }
    .to_request();
    assert_eq!(request.command, CommandKind::CloseChannel);
    let decoded = CloseRequest::from_params(&request.params).unwrap();
    assert_eq!(decoded.local_address, LocalAddress::new(9));
    assert!(CloseRequest::from_params(&ParamBlock::EMPTY).is_none());
}

#[test]
fn status_response_has_no_params() {
    let response = Response::status(ResultCode::Busy);
    assert_eq!(response.status, ResultCode::Busy);
    assert!(response.params.is_empty());
}
