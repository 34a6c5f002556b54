// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the data ring.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::vec;
use std::vec::Vec;

use proptest::prelude::*;
use xmbox_abi::layout::data_ring;

use super::*;
use crate::platform::{CountingDoorbell, Doorbell, NullDoorbell};
use crate::shm::SharedRegion;

const ORDER: u32 = 6;
const CAP: usize = 64;

fn null() -> Arc<dyn Doorbell> {
    Arc::new(NullDoorbell)
}

fn region(order: u32) -> Arc<SharedRegion> {
    Arc::new(SharedRegion::new_zeroed(data_ring::region_size(order)))
}

/// Both ends of a fresh ring.
fn pair(order: u32) -> (DataRing, DataRing, Arc<SharedRegion>) {
    let shared = region(order);
    let front = DataRing::create(Arc::clone(&shared), order, Side::Front, null()).unwrap();
    let back = DataRing::attach(Arc::clone(&shared), Side::Back, order, null()).unwrap();
    (front, back, shared)
}

#[test]
fn create_validates_order_and_region() {
    assert_eq!(
        DataRing::create(region(6), 5, Side::Front, null()).err(),
        Some(RingError::BadLayout)
    );
    assert_eq!(
        DataRing::create(region(6), 21, Side::Front, null()).err(),
        Some(RingError::OrderTooLarge {
            requested: 21,
            max: 20
        })
    );
    assert_eq!(
        DataRing::create(region(6), 7, Side::Front, null()).err(),
        Some(RingError::RegionTooSmall)
    );
}

#[test]
fn attach_rejects_order_above_maximum() {
    let shared = region(10);
    let _front = DataRing::create(Arc::clone(&shared), 10, Side::Front, null()).unwrap();
    assert_eq!(
        DataRing::attach(Arc::clone(&shared), Side::Back, 8, null()).err(),
        Some(RingError::OrderTooLarge {
            requested: 10,
            max: 8
        })
    );
    let back = DataRing::attach(shared, Side::Back, 10, null()).unwrap();
    assert_eq!(back.capacity(), 1024);
}

#[test]
fn directions_are_independent() {
    let (mut front, mut back, _) = pair(ORDER);
    assert_eq!(front.write(b"to back").unwrap(), 7);
    assert_eq!(back.write(b"to front!").unwrap(), 9);

    let mut buf = [0u8; 32];
    assert_eq!(back.read(&mut buf, false).unwrap(), 7);
    assert_eq!(&buf[..7], b"to back");
    assert_eq!(front.read(&mut buf, false).unwrap(), 9);
    assert_eq!(&buf[..9], b"to front!");
    assert_eq!(front.read(&mut buf, false).unwrap(), 0);
}

#[test]
fn oversized_write_is_partial_not_an_error() {
    let (mut front, mut back, _) = pair(ORDER);
    let data: Vec<u8> = (0..=CAP as u8).collect();
    assert_eq!(front.write(&data).unwrap(), CAP);
    assert_eq!(front.writable().unwrap(), 0);
    assert_eq!(front.write(&data).unwrap(), 0);

    let mut out = vec![0u8; CAP + 1];
    assert_eq!(back.read(&mut out, false).unwrap(), CAP);
    assert_eq!(&out[..CAP], &data[..CAP]);
    assert_eq!(front.writable().unwrap(), CAP);
}

#[test]
fn wrap_splits_four_then_six() {
    let (mut front, mut back, shared) = pair(ORDER);
    let start = (CAP - 4) as u32;
    shared.store_u32(data_ring::OUT_PRODUCER, start);
    shared.store_u32(data_ring::OUT_CONSUMER, start);

    let data = [10u8, 11, 12, 13, 14, 15, 16, 17, 18, 19];
    assert_eq!(front.write(&data).unwrap(), 10);

    // Raw layout: 4 bytes at the tail of `out`, 6 at its head
    let out_base = data_ring::out_offset(ORDER);
    let mut tail = [0u8; 4];
    shared.copy_out(out_base + CAP - 4, &mut tail);
    assert_eq!(tail, [10, 11, 12, 13]);
    let mut head = [0u8; 6];
    shared.copy_out(out_base, &mut head);
    assert_eq!(head, [14, 15, 16, 17, 18, 19]);

    let mut back_buf = [0u8; 10];
    assert_eq!(back.read(&mut back_buf, false).unwrap(), 10);
    assert_eq!(back_buf, data);
    assert_eq!(shared.load_u32(data_ring::OUT_CONSUMER), start + 10);
}

#[test]
fn cursors_wrap_at_u32_max() {
    let (mut front, mut back, shared) = pair(ORDER);
    shared.store_u32(data_ring::OUT_PRODUCER, u32::MAX - 2);
    shared.store_u32(data_ring::OUT_CONSUMER, u32::MAX - 2);
    assert_eq!(front.write(&[1, 2, 3, 4, 5, 6]).unwrap(), 6);
    assert_eq!(shared.load_u32(data_ring::OUT_PRODUCER), 3);
    assert_eq!(back.readable().unwrap(), 6);
    let mut out = [0u8; 6];
    back.read(&mut out, false).unwrap();
    assert_eq!(out, [1, 2, 3, 4, 5, 6]);
}

#[test]
fn peek_leaves_bytes_queued() {
    let (mut front, mut back, _) = pair(ORDER);
    front.write(&[7, 8, 9]).unwrap();
    let mut out = [0u8; 2];
    assert_eq!(back.read(&mut out, true).unwrap(), 2);
    assert_eq!(out, [7, 8]);
    assert_eq!(back.readable().unwrap(), 3);
    let mut all = [0u8; 3];
    assert_eq!(back.read(&mut all, false).unwrap(), 3);
    assert_eq!(all, [7, 8, 9]);
}

#[test]
fn doorbell_rings_on_publish_only() {
    let shared = region(ORDER);
    let bell = Arc::new(CountingDoorbell::new());
    let mut front =
        DataRing::create(Arc::clone(&shared), ORDER, Side::Front, bell.clone()).unwrap();
    let mut back = DataRing::attach(shared, Side::Back, ORDER, null()).unwrap();

    front.write(&[1; 10]).unwrap();
    assert_eq!(bell.take(), 1);
    front.write(&[1; 60]).unwrap();
    assert_eq!(bell.take(), 1);
    // Full ring: nothing written, nobody notified
    assert_eq!(front.write(&[1]).unwrap(), 0);
    assert_eq!(bell.take(), 0);

    let mut out = [0u8; CAP];
    back.read(&mut out, false).unwrap();
    front.write(&[2]).unwrap();
    assert_eq!(bell.take(), 1);
}

#[test]
fn cursor_skew_faults_both_sides() {
    let (mut front, mut back, shared) = pair(ORDER);
    shared.store_u32(data_ring::OUT_PRODUCER, (CAP + 1) as u32);

    let mut out = [0u8; 4];
    assert_eq!(back.read(&mut out, false), Err(RingError::Protocol));
    assert!(back.is_faulted());
    assert_eq!(shared.load_u32(data_ring::OUT_ERROR), 1);

    // The other side stops on the error field
    assert!(front.is_faulted());
    assert_eq!(front.write(&[1]), Err(RingError::PeerFault));
    assert_eq!(front.read(&mut out, false), Err(RingError::PeerFault));
    // The detecting side keeps reporting its own verdict
    assert_eq!(back.write(&[1]), Err(RingError::Protocol));
}

#[test]
fn explicit_fault_is_seen_by_peer() {
    let (mut front, mut back, _) = pair(ORDER);
    back.set_fault();
    assert_eq!(front.write(b"x"), Err(RingError::PeerFault));
}

proptest! {
    #[test]
    fn write_then_read_round_trips(
        start in any::<u32>(),
        data in proptest::collection::vec(any::<u8>(), 1..=CAP),
    ) {
        let (mut front, mut back, shared) = pair(ORDER);
        shared.store_u32(data_ring::OUT_PRODUCER, start);
        shared.store_u32(data_ring::OUT_CONSUMER, start);

        prop_assert_eq!(front.write(&data).unwrap(), data.len());
        let mut out = vec![0u8; data.len()];
        prop_assert_eq!(back.read(&mut out, false).unwrap(), data.len());
        prop_assert_eq!(out, data);
    }

    #[test]
    fn write_never_exceeds_free_space(
        queued in 0..=CAP,
        len in 0..(2 * CAP),
    ) {
        let (mut front, _back, _) = pair(ORDER);
        front.write(&vec![0u8; queued]).unwrap();
        let written = front.write(&vec![1u8; len]).unwrap();
        prop_assert_eq!(written, len.min(CAP - queued));
    }
}
