// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the message-slot engine.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::vec;
use std::vec::Vec;

use proptest::prelude::*;
use xmbox_abi::constants::{MAX_REMOTES, SLOT_BUFFER_SIZE, SLOTS_PER_REMOTE};
use xmbox_abi::layout::regs::SlotMeta;
use xmbox_abi::{DatagramHeader, DatagramKind, LocalAddress, RemoteProcessorId, SlotId};

use super::*;

fn engine() -> SlotEngine<Arc<MockMailbox>> {
    SlotEngine::new(Arc::new(MockMailbox::new()), SlotEngineConfig::new())
}

fn cpu(id: u8) -> RemoteProcessorId {
    RemoteProcessorId::new(id).unwrap()
}

fn slot(id: u8) -> SlotId {
    SlotId::new(id).unwrap()
}

fn datagram(origin: u8, destination: u8, payload: &[u8]) -> Vec<u8> {
    let header = DatagramHeader::new(
        origin,
        LocalAddress::new(1),
        LocalAddress::new(destination),
        DatagramKind::Data,
    );
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

fn no_default(inbound: Inbound) {
    panic!("unexpected default dispatch: {inbound:?}");
}

// =============================================================================
// Allocation
// =============================================================================

#[test]
fn preferred_slot_wins_when_free() {
    let engine = engine();
    let handle = engine.allocate_slot(Some(slot(5)), false).unwrap();
    assert_eq!(handle.slot(), slot(5));

    // Preferred slot taken: fall back to the normal class
    let other = engine.allocate_slot(Some(slot(5)), false).unwrap();
    assert_eq!(other.slot(), slot(2));
}

#[test]
fn priority_classes_scan_their_own_range_first() {
    let engine = engine();
    let high = engine.allocate_slot(None, true).unwrap();
    assert_eq!(high.slot(), slot(0));
    let normal = engine.allocate_slot(None, false).unwrap();
    assert_eq!(normal.slot(), slot(2));
}

#[test]
fn classes_borrow_from_each_other_when_exhausted() {
    let engine = SlotEngine::new(
        Arc::new(MockMailbox::new()),
        SlotEngineConfig::new()
            .with_tx_slots(3)
            .with_high_priority_slots(1),
    );
    let high = engine.allocate_slot(None, true).unwrap();
    assert_eq!(high.slot(), slot(0));
    // High class exhausted, borrow from the normal class
    let borrowed = engine.allocate_slot(None, true).unwrap();
    assert_eq!(borrowed.slot(), slot(1));
    let normal = engine.allocate_slot(None, false).unwrap();
    assert_eq!(normal.slot(), slot(2));
    assert_eq!(engine.allocate_slot(None, false), Err(SlotError::Busy));
}

#[test]
fn exhaustion_is_busy_until_a_slot_is_freed() {
    let engine = engine();
    let mut handles: Vec<_> = (0..SLOTS_PER_REMOTE)
        .map(|_| engine.allocate_slot(None, false).unwrap())
        .collect();
    assert_eq!(engine.allocate_slot(None, false), Err(SlotError::Busy));
    assert_eq!(engine.allocate_slot(None, true), Err(SlotError::Busy));

    let freed = handles.remove(3);
    let freed_id = freed.slot();
    engine.free_slot(freed).unwrap();
    let again = engine.allocate_slot(None, false).unwrap();
    assert_eq!(again.slot(), freed_id);
}

#[test]
fn config_is_clamped_to_hardware() {
    let engine = SlotEngine::new(
        Arc::new(MockMailbox::new()),
        SlotEngineConfig::new()
            .with_tx_slots(64)
            .with_high_priority_slots(99)
            .with_remotes(17)
            .with_early_ack_prefix(1),
    );
    let config = engine.config();
    assert_eq!(config.tx_slots, SLOTS_PER_REMOTE);
    assert_eq!(config.high_priority_slots, SLOTS_PER_REMOTE);
    assert_eq!(config.remotes, MAX_REMOTES);
    assert_eq!(config.early_ack_prefix, DatagramHeader::SIZE);
}

#[derive(Debug, Clone)]
enum Op {
    Allocate { preferred: Option<u8>, high: bool },
    Free(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (proptest::option::of(0u8..8), any::<bool>())
            .prop_map(|(preferred, high)| Op::Allocate { preferred, high }),
        (0usize..16).prop_map(Op::Free),
    ]
}

proptest! {
    #[test]
    fn live_allocations_never_share_a_slot(ops in proptest::collection::vec(op_strategy(), 1..64)) {
        let engine = engine();
        let mut live: Vec<SlotHandle> = Vec::new();
        for op in ops {
            match op {
                Op::Allocate { preferred, high } => {
                    match engine.allocate_slot(preferred.and_then(SlotId::new), high) {
                        Ok(handle) => {
                            prop_assert!(live.iter().all(|h| h.slot() != handle.slot()));
                            live.push(handle);
                        }
                        Err(err) => {
                            prop_assert_eq!(err, SlotError::Busy);
                            prop_assert_eq!(live.len(), SLOTS_PER_REMOTE);
                        }
                    }
                }
                Op::Free(index) => {
                    if !live.is_empty() {
                        let handle = live.swap_remove(index % live.len());
                        prop_assert!(engine.free_slot(handle).is_ok());
                    }
                }
            }
        }
    }
}

// =============================================================================
// Transfers
// =============================================================================

#[test]
fn send_programs_hardware_and_completes() {
    let engine = engine();
    let handle = engine.allocate_slot(None, false).unwrap();
    engine.send(&handle, cpu(2), &[1, 2, 3, 4, 5]).unwrap();

    let sent = engine.regs().take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].slot, handle.slot().as_u8());
    assert_eq!(sent[0].target_mask, 0b100);
    assert_eq!(sent[0].bytes, vec![1, 2, 3, 4, 5]);

    assert!(!engine.poll_send_done(&handle));
    assert_eq!(engine.send(&handle, cpu(2), &[9]), Err(SlotError::InFlight));

    engine.regs().complete_send(handle.slot().index());
    assert!(engine.poll_send_done(&handle));

    // Completed slot can carry another transfer for the same owner
    engine.send(&handle, cpu(1), &[9]).unwrap();
    engine.regs().complete_all();
    assert!(engine.poll_send_done(&handle));
    engine.free_slot(handle).unwrap();
}

#[test]
fn send_datagram_prefixes_header() {
    let engine = engine();
    let handle = engine.allocate_slot(None, false).unwrap();
    let header = DatagramHeader::new(
        7,
        LocalAddress::new(3),
        LocalAddress::new(4),
        DatagramKind::Control,
    );
    engine
        .send_datagram(&handle, cpu(0), header, b"hello")
        .unwrap();
    let sent = engine.regs().take_sent();
    assert_eq!(sent[0].bytes, datagram_with(header, b"hello"));
    engine.regs().complete_all();
    engine.free_slot(handle).unwrap();
}

fn datagram_with(header: DatagramHeader, payload: &[u8]) -> Vec<u8> {
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn send_rejects_bad_arguments_without_touching_hardware() {
    let engine = SlotEngine::new(
        Arc::new(MockMailbox::new()),
        SlotEngineConfig::new().with_remotes(2),
    );
    let handle = engine.allocate_slot(None, false).unwrap();
    assert_eq!(
        engine.send(&handle, cpu(0), &vec![0u8; SLOT_BUFFER_SIZE + 1]),
        Err(SlotError::TooLarge)
    );
    assert_eq!(engine.send(&handle, cpu(3), &[1]), Err(SlotError::InvalidRemote));
    assert!(engine.regs().take_sent().is_empty());

    // The slot is still usable
    engine.send(&handle, cpu(1), &vec![0xAB; SLOT_BUFFER_SIZE]).unwrap();
    assert_eq!(engine.regs().take_sent()[0].bytes.len(), SLOT_BUFFER_SIZE);
}

#[test]
fn readback_mismatch_frees_slot_and_stales_handle() {
    let engine = engine();
    let handle = engine.allocate_slot(Some(slot(4)), false).unwrap();
    engine.regs().set_readback_fault(4, true);

    assert_eq!(
        engine.send(&handle, cpu(1), &[1, 2, 3]),
        Err(SlotError::HwFault(slot(4)))
    );
    assert!(engine.regs().take_sent().is_empty());
    assert_eq!(engine.stats().hw_faults, 1);

    // Handle no longer owns anything
    assert!(engine.poll_send_done(&handle));
    assert_eq!(engine.send(&handle, cpu(1), &[1]), Err(SlotError::Stale));

    // Slot is immediately reusable by someone else
    engine.regs().set_readback_fault(4, false);
    let next = engine.allocate_slot(Some(slot(4)), false).unwrap();
    assert_eq!(next.slot(), slot(4));
    assert_eq!(engine.free_slot(handle), Err(SlotError::Stale));
    engine.free_slot(next).unwrap();
}

#[test]
fn freeing_in_flight_slot_detaches_it_to_the_reaper() {
    let engine = engine();
    let handle = engine.allocate_slot(Some(slot(6)), false).unwrap();
    engine.send(&handle, cpu(0), &[1]).unwrap();
    assert_eq!(engine.free_slot(handle), Err(SlotError::InFlight));

    // Detached slot is not free yet
    assert_eq!(engine.reap(4), 0);
    let other = engine.allocate_slot(Some(slot(6)), false).unwrap();
    assert_ne!(other.slot(), slot(6));

    engine.regs().complete_send(6);
    assert_eq!(engine.reap(4), 1);
    assert_eq!(engine.stats().reaped, 1);
    let reused = engine.allocate_slot(Some(slot(6)), false).unwrap();
    assert_eq!(reused.slot(), slot(6));
}

#[test]
fn release_after_send_frees_idle_slot_immediately() {
    let engine = engine();
    let handle = engine.allocate_slot(Some(slot(3)), false).unwrap();
    engine.release_after_send(handle).unwrap();
    let again = engine.allocate_slot(Some(slot(3)), false).unwrap();
    assert_eq!(again.slot(), slot(3));
}

#[test]
fn reap_respects_quota_and_rotates() {
    let engine = engine();
    for _ in 0..4 {
        let handle = engine.allocate_slot(None, false).unwrap();
        engine.send(&handle, cpu(0), &[0]).unwrap();
        engine.release_after_send(handle).unwrap();
    }
    engine.regs().complete_all();

    assert_eq!(engine.reap(1), 1);
    assert_eq!(engine.reap(2), 2);
    assert_eq!(engine.reap(8), 1);
    assert_eq!(engine.reap(8), 0);
    assert_eq!(engine.stats().reaped, 4);
}

#[test]
fn reap_skips_busy_detached_slots_without_freeing() {
    let engine = engine();
    let busy = engine.allocate_slot(Some(slot(2)), false).unwrap();
    engine.send(&busy, cpu(0), &[0]).unwrap();
    engine.release_after_send(busy).unwrap();

    let done = engine.allocate_slot(Some(slot(3)), false).unwrap();
    engine.send(&done, cpu(0), &[0]).unwrap();
    engine.release_after_send(done).unwrap();
    engine.regs().complete_send(3);

    assert_eq!(engine.reap(8), 1);
    engine.regs().complete_send(2);
    assert_eq!(engine.reap(8), 1);
}

#[test]
fn cancel_aborts_transfer() {
    let engine = engine();
    let handle = engine.allocate_slot(None, false).unwrap();
    let id = handle.slot();
    engine.send(&handle, cpu(0), &[1, 2]).unwrap();
    engine.cancel_slot(handle).unwrap();
    assert_eq!(engine.regs().cancel_count(), 1);
    let again = engine.allocate_slot(Some(id), false).unwrap();
    assert_eq!(again.slot(), id);
}

// =============================================================================
// Receive
// =============================================================================

#[test]
fn receive_dispatches_to_endpoint_then_acks() {
    let engine = engine();
    let rx = engine.register_endpoint(LocalAddress::new(9), false).unwrap();
    let bytes = datagram(1, 9, b"payload");
    assert!(engine.regs().inject(1, 2, &bytes));

    assert_eq!(engine.on_receive_interrupt(&mut no_default), 1);
    assert_eq!(rx.try_recv(), Some(bytes));
    assert!(!engine.regs().is_pending(1, 2));
    assert_eq!(engine.regs().ack_count(), 1);
    assert_eq!(engine.stats().dispatched, 1);
}

#[test]
fn early_ack_endpoint_gets_prefix_only() {
    let engine = SlotEngine::new(
        Arc::new(MockMailbox::new()),
        SlotEngineConfig::new().with_early_ack_prefix(8),
    );
    let rx = engine.register_endpoint(LocalAddress::new(2), true).unwrap();
    let bytes = datagram(0, 2, &[0x55; 40]);
    engine.regs().inject(0, 0, &bytes);

    engine.on_receive_interrupt(&mut no_default);
    assert_eq!(rx.try_recv(), Some(bytes[..8].to_vec()));
    assert_eq!(engine.regs().ack_count(), 1);
}

#[test]
fn unrouted_datagram_reaches_default_once_unmodified() {
    let engine = engine();
    let _rx = engine.register_endpoint(LocalAddress::new(1), false).unwrap();
    let bytes = datagram(3, 42, &[1, 2, 3, 4, 5, 6, 7]);
    engine.regs().inject(3, 7, &bytes);

    let mut seen = Vec::new();
    let handled = engine.on_receive_interrupt(&mut |inbound| seen.push(inbound));
    assert_eq!(handled, 1);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].remote, cpu(3));
    assert_eq!(seen[0].bytes, bytes);
    assert_eq!(seen[0].payload(), &[1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(engine.regs().ack_count(), 1);
    assert_eq!(engine.stats().forwarded, 1);

    // Nothing left pending: a second interrupt handles nothing
    assert_eq!(engine.on_receive_interrupt(&mut no_default), 0);
}

#[test]
fn several_pending_buffers_are_each_acked_once() {
    let engine = engine();
    let rx = engine.register_endpoint(LocalAddress::new(5), false).unwrap();
    for (remote, slot) in [(0, 1), (1, 0), (2, 7), (3, 3)] {
        engine.regs().inject(remote, slot, &datagram(remote as u8, 5, &[slot as u8]));
    }
    assert_eq!(engine.on_receive_interrupt(&mut no_default), 4);
    assert_eq!(rx.len(), 4);
    assert_eq!(engine.regs().ack_count(), 4);
}

#[test]
fn malformed_buffers_are_acked_and_counted() {
    let engine = engine();
    // Pad larger than the transfer
    let bad_len = SlotMeta {
        words: 0,
        slot: 0,
        target_mask: 0,
        pad: 3,
    };
    engine.regs().inject_raw(0, 0, bad_len.encode(), &[]);
    // Shorter than a header
    engine.regs().inject(0, 1, &[1, 2]);
    // Unknown datagram kind
    engine.regs().inject(0, 2, &[0, 1, 2, 0xEE]);

    assert_eq!(engine.on_receive_interrupt(&mut no_default), 3);
    assert_eq!(engine.stats().malformed, 3);
    assert_eq!(engine.regs().ack_count(), 3);
}

#[test]
fn status_bit_of_unattached_processor_is_a_fault() {
    let engine = SlotEngine::new(
        Arc::new(MockMailbox::new()),
        SlotEngineConfig::new().with_remotes(2),
    );
    engine.regs().inject(3, 0, &datagram(3, 1, &[]));
    assert_eq!(engine.on_receive_interrupt(&mut no_default), 1);
    assert_eq!(engine.stats().hw_faults, 1);
    assert!(!engine.regs().is_pending(3, 0));
}

#[test]
fn full_endpoint_queue_drops() {
    let engine = SlotEngine::new(
        Arc::new(MockMailbox::new()),
        SlotEngineConfig::new().with_rx_queue_depth(1),
    );
    let rx = engine.register_endpoint(LocalAddress::new(4), false).unwrap();
    engine.regs().inject(0, 0, &datagram(0, 4, b"a"));
    engine.regs().inject(0, 1, &datagram(0, 4, b"b"));
    engine.on_receive_interrupt(&mut no_default);

    assert_eq!(rx.len(), 1);
    let stats = engine.stats();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(engine.regs().ack_count(), 2);
}

#[test]
fn endpoint_registration_lifecycle() {
    let engine = engine();
    let address = LocalAddress::new(8);
    let rx = engine.register_endpoint(address, false).unwrap();
    assert_eq!(
        engine.register_endpoint(address, true).err(),
        Some(SlotError::AddressInUse)
    );

    // Dropping the receiver retires the registration
    drop(rx);
    let rx = engine.register_endpoint(address, false).unwrap();
    assert!(engine.unregister_endpoint(address));
    assert!(!engine.unregister_endpoint(address));

    // Unregistered: traffic goes to the default handler
    engine.regs().inject(0, 0, &datagram(0, 8, b"x"));
    let mut forwarded = 0;
    engine.on_receive_interrupt(&mut |_| forwarded += 1);
    assert_eq!(forwarded, 1);
    assert!(rx.is_empty());
}

#[test]
fn send_and_receive_from_two_threads() {
    let engine = Arc::new(engine());
    engine.regs().set_auto_complete(true);
    let rx = engine.register_endpoint(LocalAddress::new(1), false).unwrap();

    let sender = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            for i in 0..200u32 {
                loop {
                    match engine.allocate_slot(None, false) {
                        Ok(handle) => {
                            engine.send(&handle, cpu(1), &i.to_ne_bytes()).unwrap();
                            engine.release_after_send(handle).unwrap();
                            break;
                        }
                        Err(SlotError::Busy) => std::thread::yield_now(),
                        Err(err) => panic!("unexpected {err}"),
                    }
                }
            }
        })
    };

    let mut received = 0;
    let mut round = 0u8;
    while received < 50 {
        if engine.regs().inject(0, usize::from(round % 8), &datagram(0, 1, &[round])) {
            round = round.wrapping_add(1);
        }
        engine.on_receive_interrupt(&mut no_default);
        while rx.try_recv().is_some() {
            received += 1;
        }
    }
    sender.join().unwrap();
    assert_eq!(engine.regs().take_sent().len(), 200);
}
