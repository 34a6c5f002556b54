// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bounded handoff queues for inbound datagrams.
//!
//! The receive path runs with interrupts masked and must never wait on
//! application code. It pushes each datagram into the owning endpoint's
//! queue and moves on; the owning task drains the queue in its own time.
//! A full queue rejects the push and the datagram is counted as dropped.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::sync::IrqMutex;


struct QueueState {
    items: VecDeque<Vec<u8>>,
    depth: usize,
    dropped: u64,
    closed: bool,
}

/// Create a bounded queue holding at most `depth` datagrams.
#[must_use]
pub fn bounded(depth: usize) -> (QueueSender, QueueReceiver) {
    let shared = Arc::new(IrqMutex::new(QueueState {
        items: VecDeque::with_capacity(depth),
        depth,
        dropped: 0,
        closed: false,
    }));
    (
        QueueSender {
            shared: Arc::clone(&shared),
        },
        QueueReceiver { shared },
    )
}

/// Push was rejected because the queue is at its depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue full")
    }
}

/// Producing end, held by the receive path.
#[derive(Clone)]
pub struct QueueSender {
    shared: Arc<IrqMutex<QueueState>>,
}

impl QueueSender {
    /// Append a datagram, failing if the queue is full.
    pub fn push(&self, item: Vec<u8>) -> Result<(), QueueFull> {
        let mut state = self.shared.lock();
        if state.items.len() >= state.depth {
            state.dropped += 1;
            return Err(QueueFull);
        }
        state.items.push_back(item);
        Ok(())
    }

    /// Returns true once the receiving end has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl fmt::Debug for QueueSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender").finish_non_exhaustive()
    }
}

/// Consuming end, held by the owning task.
pub struct QueueReceiver {
    shared: Arc<IrqMutex<QueueState>>,
}

impl QueueReceiver {
    /// Take the oldest queued datagram, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.shared.lock().items.pop_front()
    }

    /// Number of datagrams waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pushes rejected because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.lock().dropped
    }
}

impl Drop for QueueReceiver {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.closed = true;
        state.items.clear();
    }
}

impl fmt::Debug for QueueReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReceiver")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
