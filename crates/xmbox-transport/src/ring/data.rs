// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Byte-stream data ring.
//!
//! One shared region carries two independent directions. `in` flows from
//! the privileged side to the client and `out` flows back. Cursors are
//! free-running `u32` counters; `producer - consumer` (wrapping) is the
//! number of queued bytes and must never exceed the capacity.

use alloc::sync::Arc;

use tracing::warn;
use xmbox_abi::constants::{MAX_RING_ORDER, MIN_RING_ORDER};
use xmbox_abi::layout::data_ring;

use super::RingError;
use crate::platform::Doorbell;
use crate::shm::{RingWindow, SharedRegion};

/// Which end of a data ring this instance drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Client end: transmits on `out`, receives on `in`.
    Front,
    /// Privileged end: transmits on `in`, receives on `out`.
    Back,
}

/// Header offsets and byte window of one direction.
#[derive(Debug, Clone, Copy)]
struct Direction {
    producer: usize,
    consumer: usize,
    window: RingWindow,
}

/// One end of a data ring.
pub struct DataRing {
    region: Arc<SharedRegion>,
    order: u32,
    side: Side,
    tx: Direction,
    rx: Direction,
    doorbell: Arc<dyn Doorbell>,
    faulted: bool,
}

impl DataRing {
    /// Initialize a ring of capacity `2^order` in `region` and publish its order.
    ///
    /// Used by the opening side. Any previous header contents are discarded.
    pub fn create(
        region: Arc<SharedRegion>,
        order: u32,
        side: Side,
        doorbell: Arc<dyn Doorbell>,
    ) -> Result<Self, RingError> {
        let ring = Self::build(region, order, MAX_RING_ORDER, side, doorbell)?;
        ring.region.zero(0, data_ring::HEADER_SIZE);
        ring.region.store_u32(data_ring::RING_ORDER, order);
        Ok(ring)
    }

    /// Attach to a ring another side created, accepting orders up to `max_order`.
    ///
    /// A larger published order is rejected, never clamped.
    pub fn attach(
        region: Arc<SharedRegion>,
        side: Side,
        max_order: u32,
        doorbell: Arc<dyn Doorbell>,
    ) -> Result<Self, RingError> {
        let order = region.load_u32(data_ring::RING_ORDER);
        Self::build(region, order, max_order.min(MAX_RING_ORDER), side, doorbell)
    }

    fn build(
        region: Arc<SharedRegion>,
        order: u32,
        max_order: u32,
        side: Side,
        doorbell: Arc<dyn Doorbell>,
    ) -> Result<Self, RingError> {
        if order > max_order {
            return Err(RingError::OrderTooLarge {
                requested: order,
                max: max_order,
            });
        }
        if order < MIN_RING_ORDER {
            return Err(RingError::BadLayout);
        }
        if region.len() < data_ring::region_size(order) {
            return Err(RingError::RegionTooSmall);
        }

        let capacity = data_ring::capacity(order);
        let window = |offset| RingWindow::new(offset, capacity).ok_or(RingError::BadLayout);
        let inbound = Direction {
            producer: data_ring::IN_PRODUCER,
            consumer: data_ring::IN_CONSUMER,
            window: window(data_ring::in_offset())?,
        };
        let outbound = Direction {
            producer: data_ring::OUT_PRODUCER,
            consumer: data_ring::OUT_CONSUMER,
            window: window(data_ring::out_offset(order))?,
        };
        let (tx, rx) = match side {
            Side::Front => (outbound, inbound),
            Side::Back => (inbound, outbound),
        };
        Ok(Self {
            region,
            order,
            side,
            tx,
            rx,
            doorbell,
            faulted: false,
        })
    }

    /// Ring order (capacity is `2^order`).
    #[must_use]
    pub const fn order(&self) -> u32 {
        self.order
    }

    /// Capacity of each direction in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        data_ring::capacity(self.order)
    }

    /// Which end this is.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Queued bytes in `dir`, or `Protocol` if the cursors are skewed.
    fn queued(&mut self, dir: Direction) -> Result<(u32, u32, usize), RingError> {
        let producer = self.region.load_u32(dir.producer);
        let consumer = self.region.load_u32(dir.consumer);
        let queued = producer.wrapping_sub(consumer) as usize;
        if queued > self.capacity() {
            warn!(producer, consumer, capacity = self.capacity(), "data ring cursor skew");
            self.set_fault();
            return Err(RingError::Protocol);
        }
        Ok((producer, consumer, queued))
    }

    fn check_faults(&self) -> Result<(), RingError> {
        if self.faulted {
            return Err(RingError::Protocol);
        }
        if self.peer_faulted() {
            return Err(RingError::PeerFault);
        }
        Ok(())
    }

    fn peer_faulted(&self) -> bool {
        self.region.load_u32(data_ring::IN_ERROR) != 0
            || self.region.load_u32(data_ring::OUT_ERROR) != 0
    }

    /// Write as much of `bytes` as fits. Never blocks.
    ///
    /// Returns the number of bytes written, which is zero when the ring is
    /// full. The producer cursor is published after the bytes are in place,
    /// then the peer is notified.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, RingError> {
        self.check_faults()?;
        let (producer, _, queued) = self.queued(self.tx)?;
        let count = (self.capacity() - queued).min(bytes.len());
        if count == 0 {
            return Ok(0);
        }
        self.tx
            .window
            .write(&self.region, producer, &bytes[..count]);
        // Release store: the bytes above are visible before the new cursor
        self.region
            .store_u32(self.tx.producer, producer.wrapping_add(count as u32));
        self.doorbell.ring();
        Ok(count)
    }

    /// Read up to `out.len()` queued bytes.
    ///
    /// With `peek` set the consumer cursor is left alone, so the same bytes
    /// are returned again by the next read.
    pub fn read(&mut self, out: &mut [u8], peek: bool) -> Result<usize, RingError> {
        self.check_faults()?;
        let (_, consumer, queued) = self.queued(self.rx)?;
        let count = queued.min(out.len());
        if count == 0 {
            return Ok(0);
        }
        self.rx
            .window
            .read(&self.region, consumer, &mut out[..count]);
        if !peek {
            self.region
                .store_u32(self.rx.consumer, consumer.wrapping_add(count as u32));
            // Wake a producer that may be waiting for space
            if queued > self.capacity() / 2 {
                self.doorbell.ring();
            }
        }
        Ok(count)
    }

    /// Bytes waiting to be read.
    pub fn readable(&mut self) -> Result<usize, RingError> {
        self.check_faults()?;
        self.queued(self.rx).map(|(_, _, queued)| queued)
    }

    /// Free space for writing.
    pub fn writable(&mut self) -> Result<usize, RingError> {
        self.check_faults()?;
        let capacity = self.capacity();
        self.queued(self.tx).map(|(_, _, queued)| capacity - queued)
    }

    /// Mark the ring dead for both sides.
    pub fn set_fault(&mut self) {
        self.faulted = true;
        self.region.store_u32(data_ring::IN_ERROR, 1);
        self.region.store_u32(data_ring::OUT_ERROR, 1);
        self.doorbell.ring();
    }

    /// Returns true once either side flagged the ring.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted || self.peer_faulted()
    }
}

impl core::fmt::Debug for DataRing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataRing")
            .field("order", &self.order)
            .field("side", &self.side)
            .field("faulted", &self.faulted)
            .finish_non_exhaustive()
    }
}
