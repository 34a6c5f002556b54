// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Outstanding command ring calls.

use alloc::boxed::Box;
use alloc::sync::Arc;

use xmbox_abi::{RequestId, Response};

use crate::sync::IrqMutex;

/// A command waiting for its response.
///
/// The issuing caller owns the call. Response dispatch only fills in the
/// response; it never removes the call from the pending list.
#[derive(Debug)]
pub struct PendingCall {
    id: RequestId,
    response: IrqMutex<Option<Response>>,
}

impl PendingCall {
    /// Create a call waiting on `id`.
    #[must_use]
    pub const fn new(id: RequestId) -> Self {
        Self {
            id,
            response: IrqMutex::new(None),
        }
    }

    /// Request id the call waits on.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Store the response. A second response for the same call is ignored.
    pub fn complete(&self, response: Response) {
        let mut slot = self.response.lock();
        if slot.is_none() {
            *slot = Some(response);
        }
    }

    /// Returns true once a response arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.response.lock().is_some()
    }

    /// Take the response, if it arrived.
    #[must_use]
    pub fn take(&self) -> Option<Response> {
        self.response.lock().take()
    }
}

struct Node {
    call: Arc<PendingCall>,
    next: Option<Box<Node>>,
}

/// Singly linked list of outstanding calls.
///
/// Bounded by the command ring's slot count, so linear scans stay short.
#[derive(Default)]
pub struct PendingList {
    head: Option<Box<Node>>,
    len: usize,
}

impl PendingList {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Insert a call at the head.
    pub fn push(&mut self, call: Arc<PendingCall>) {
        let next = self.head.take();
        self.head = Some(Box::new(Node { call, next }));
        self.len += 1;
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<PendingCall>> {
        core::iter::successors(self.head.as_deref(), |node| node.next.as_deref())
            .map(|node| &node.call)
    }

    /// The call still waiting on `id`, if any.
    #[must_use]
    pub fn find_waiting(&self, id: RequestId) -> Option<&Arc<PendingCall>> {
        self.iter()
            .find(|call| call.id() == id && !call.is_complete())
    }

    /// Returns true if any listed call carries `id`.
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.iter().any(|call| call.id() == id)
    }

    /// Unlink `call`. Returns false if it was not listed.
    pub fn remove(&mut self, call: &Arc<PendingCall>) -> bool {
        let mut cursor = &mut self.head;
        while cursor
            .as_ref()
            .is_some_and(|node| !Arc::ptr_eq(&node.call, call))
        {
            let Some(node) = cursor.as_mut() else {
                return false;
            };
            cursor = &mut node.next;
        }
        let Some(mut node) = cursor.take() else {
            return false;
        };
        *cursor = node.next.take();
        self.len -= 1;
        true
    }

    /// Number of listed calls.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is outstanding.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for PendingList {
    fn drop(&mut self) {
        let mut cursor = self.head.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
        }
    }
}

impl core::fmt::Debug for PendingList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter().map(|call| call.id())).finish()
    }
}
