// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the pending call list.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::vec::Vec;

use xmbox_abi::{RequestId, Response, ResultCode};

use super::*;

fn call(id: u32) -> Arc<PendingCall> {
    Arc::new(PendingCall::new(RequestId::new(id)))
}

#[test]
fn completion_is_taken_once() {
    let pending = call(1);
    assert!(!pending.is_complete());
    pending.complete(Response::status(ResultCode::Ok));
    pending.complete(Response::status(ResultCode::Busy));
    assert_eq!(pending.take(), Some(Response::status(ResultCode::Ok)));
    assert_eq!(pending.take(), None);
}

#[test]
fn remove_head_middle_and_tail() {
    let mut list = PendingList::new();
    let calls: Vec<_> = (0..4).map(call).collect();
    for c in &calls {
        list.push(Arc::clone(c));
    }
    assert_eq!(list.len(), 4);

    // Head is the most recently pushed
    assert!(list.remove(&calls[3]));
    assert!(list.remove(&calls[1]));
    assert!(list.remove(&calls[0]));
    assert!(!list.remove(&calls[0]));
    assert_eq!(list.len(), 1);
    assert!(list.contains(RequestId::new(2)));
    assert!(!list.contains(RequestId::new(1)));

    assert!(list.remove(&calls[2]));
    assert!(list.is_empty());
}

#[test]
fn find_waiting_skips_completed_calls_with_same_id() {
    let mut list = PendingList::new();
    let old = call(5);
    old.complete(Response::status(ResultCode::Ok));
    let new = call(5);
    list.push(Arc::clone(&new));
    list.push(Arc::clone(&old));

    let found = list.find_waiting(RequestId::new(5)).unwrap();
    assert!(Arc::ptr_eq(found, &new));

    new.complete(Response::status(ResultCode::Ok));
    assert!(list.find_waiting(RequestId::new(5)).is_none());
}

#[test]
fn long_list_drops_without_recursion() {
    let mut list = PendingList::new();
    for id in 0..100_000 {
        list.push(call(id));
    }
    drop(list);
}
