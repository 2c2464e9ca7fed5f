//! RTP datagram inspection: fixed-header parsing and the stream identity gate.

pub mod dispatch;
pub mod header;

use std::fmt;

pub use dispatch::{Disposition, IdentityGate, admits, dispatch};
pub use header::{HEADER_SIZE, HeaderError, RtpHeader};

/// Synchronization source identifier carried by every packet of a stream.
///
/// Zero is the "unset" sentinel: a gate expecting it admits any sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamIdentity(u32);

impl StreamIdentity {
    pub const UNSET: Self = Self(0);

    #[must_use]
    pub const fn new(ssrc: u32) -> Self {
        Self(ssrc)
    }

    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for StreamIdentity {
    fn from(ssrc: u32) -> Self {
        Self(ssrc)
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}
