// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Errors visible to channel users.

use core::fmt;

use xmbox_abi::ResultCode;
use xmbox_transport::CallError;

/// Why a channel could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    /// The multiplexer did not answer in time. It may still act on the request.
    Timeout,
    /// Out of ring regions, command slots or routes. Retry later.
    Busy,
    /// This domain already has a channel at the address.
    AlreadyExists,
    /// The multiplexer refused the request.
    Rejected,
}

impl OpenError {
    /// Map a non-`Ok` result code onto the client-visible kinds.
    pub(crate) const fn from_status(status: ResultCode) -> Self {
        match status {
            ResultCode::AlreadyExists => Self::AlreadyExists,
            ResultCode::Busy => Self::Busy,
            ResultCode::Ok | ResultCode::NotFound | ResultCode::Rejected | ResultCode::Invalid => {
                Self::Rejected
            }
        }
    }
}

impl From<CallError> for OpenError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Timeout => Self::Timeout,
            CallError::Full => Self::Busy,
            CallError::Fault => Self::Rejected,
        }
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "open timed out"),
            Self::Busy => write!(f, "no resources to open channel"),
            Self::AlreadyExists => write!(f, "channel address in use"),
            Self::Rejected => write!(f, "open rejected"),
        }
    }
}

/// Why a send did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The ring stayed full for the whole spin budget. Nothing was written.
    Busy,
    /// The channel is closed or its ring faulted.
    ChannelClosed,
    /// The datagram exceeds the channel's maximum payload.
    TooLarge,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "channel busy"),
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::TooLarge => write!(f, "datagram too large"),
        }
    }
}
