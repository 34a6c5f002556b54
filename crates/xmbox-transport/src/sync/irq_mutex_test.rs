// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for `IrqMutex`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::vec::Vec;

use super::*;

/// Interrupt control that records nesting depth.
struct TrackingIrq {
    depth: AtomicUsize,
    restores: AtomicUsize,
}

impl IrqControl for TrackingIrq {
    fn save_and_disable(&self) -> usize {
        self.depth.fetch_add(1, Ordering::SeqCst)
    }

    fn restore(&self, saved: usize) {
        self.restores.fetch_add(1, Ordering::SeqCst);
        self.depth.store(saved, Ordering::SeqCst);
    }
}

static TRACKING: TrackingIrq = TrackingIrq {
    depth: AtomicUsize::new(0),
    restores: AtomicUsize::new(0),
};

#[test]
fn guard_masks_and_restores() {
    let mutex = IrqMutex::with_control(5u32, &TRACKING);
    {
        let mut guard = mutex.lock();
        *guard += 1;
        assert_eq!(TRACKING.depth.load(Ordering::SeqCst), 1);
    }
    assert_eq!(TRACKING.depth.load(Ordering::SeqCst), 0);
    assert!(TRACKING.restores.load(Ordering::SeqCst) >= 1);
    assert_eq!(mutex.into_inner(), 6);
}

#[test]
fn contended_increments() {
    let counter = Arc::new(IrqMutex::new(0usize));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    *counter.lock() += 1;
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(*counter.lock(), 4_000);
}
