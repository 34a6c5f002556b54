// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for frame reassembly.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::vec::Vec;

use xmbox_abi::constants::MAX_DATAGRAM_PAYLOAD;
use xmbox_abi::layout::data_ring;

use super::*;
use crate::platform::NullDoorbell;
use crate::shm::SharedRegion;

fn pair(order: u32) -> (DataRing, DataRing) {
    let shared = Arc::new(SharedRegion::new_zeroed(data_ring::region_size(order)));
    let front =
        DataRing::create(Arc::clone(&shared), order, Side::Front, Arc::new(NullDoorbell)).unwrap();
    let back = DataRing::attach(shared, Side::Back, order, Arc::new(NullDoorbell)).unwrap();
    (front, back)
}

fn framed(payload: &[u8]) -> Vec<u8> {
    let mut bytes = encode_prefix(payload.len()).unwrap().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn prefix_encoding_limits() {
    assert_eq!(encode_prefix(0), Some([0, 0]));
    assert_eq!(encode_prefix(300), Some(300u16.to_ne_bytes()));
    assert_eq!(encode_prefix(70_000), None);
}

#[test]
fn whole_frames_come_out_in_order() {
    let (mut front, mut back) = pair(8);
    front.write(&framed(b"one")).unwrap();
    front.write(&framed(b"")).unwrap();
    front.write(&framed(b"three")).unwrap();

    let mut assembler = FrameAssembler::new(MAX_DATAGRAM_PAYLOAD);
    assert_eq!(assembler.pump(&mut back).unwrap(), Some(b"one".to_vec()));
    assert_eq!(assembler.pump(&mut back).unwrap(), Some(Vec::new()));
    assert_eq!(assembler.pump(&mut back).unwrap(), Some(b"three".to_vec()));
    assert_eq!(assembler.pump(&mut back).unwrap(), None);
}

#[test]
fn half_prefix_is_left_in_the_ring() {
    let (mut front, mut back) = pair(6);
    let bytes = framed(b"abc");
    front.write(&bytes[..1]).unwrap();

    let mut assembler = FrameAssembler::new(64);
    assert_eq!(assembler.pump(&mut back).unwrap(), None);
    assert!(!assembler.in_progress());
    assert_eq!(back.readable().unwrap(), 1);

    front.write(&bytes[1..]).unwrap();
    assert_eq!(assembler.pump(&mut back).unwrap(), Some(b"abc".to_vec()));
}

#[test]
fn frame_larger_than_ring_is_reassembled() {
    let (mut front, mut back) = pair(6);
    let payload: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();
    let bytes = framed(&payload);

    let mut assembler = FrameAssembler::new(MAX_DATAGRAM_PAYLOAD);
    let mut sent = 0;
    let mut frames = Vec::new();
    while sent < bytes.len() {
        sent += front.write(&bytes[sent..]).unwrap();
        if let Some(frame) = assembler.pump(&mut back).unwrap() {
            frames.push(frame);
        }
    }
    while let Some(frame) = assembler.pump(&mut back).unwrap() {
        frames.push(frame);
    }
    assert_eq!(frames, [payload]);
}

#[test]
fn oversized_prefix_faults_the_ring() {
    let (mut front, mut back) = pair(6);
    front.write(&framed(&[0u8; 40])).unwrap();
    let mut assembler = FrameAssembler::new(16);
    assert_eq!(assembler.pump(&mut back), Err(RingError::Protocol));
    assert!(front.is_faulted());
}
