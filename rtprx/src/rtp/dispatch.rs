//! Identity gate between the socket and the stream target.
//!
//! Every datagram is parsed and its SSRC compared with the expected identity
//! before the target sees a single byte of it.

use crate::session::StreamTarget;
use crate::trace::{debug, trace, warn};

use super::StreamIdentity;
use super::header::{HeaderError, RtpHeader};

/// What happened to one received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Shorter than the fixed header; dropped unread.
    Malformed(HeaderError),
    /// Well-formed but from another source; the target was not called.
    Discarded { ssrc: StreamIdentity },
    /// Handed to the target; `accepted` is what the target returned.
    Delivered { accepted: bool },
}

impl Disposition {
    /// `true` only when the target received and accepted the packet.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Delivered { accepted: true })
    }
}

/// Whether a packet carrying `observed` may pass a gate expecting `expected`.
#[must_use]
pub const fn admits(expected: StreamIdentity, observed: StreamIdentity) -> bool {
    expected.is_unset() || expected.as_u32() == observed.as_u32()
}

/// Parses `packet`, applies the identity gate, and forwards it on a match.
///
/// The target gets the whole datagram, unchanged, exactly once.
pub fn dispatch<T>(packet: &[u8], expected: StreamIdentity, target: &T) -> Disposition
where
    T: StreamTarget + ?Sized,
{
    let header = match RtpHeader::parse(packet) {
        Ok(header) => header,
        Err(e) => {
            debug!(error = %e, "dropping malformed datagram");
            return Disposition::Malformed(e);
        }
    };

    trace!(
        version = header.version,
        padding = header.padding,
        payload_type = header.payload_type,
        marker = header.marker,
        seq = header.sequence,
        timestamp = header.timestamp,
        ssrc = %header.ssrc,
        "rtp header"
    );

    if !admits(expected, header.ssrc) {
        warn!(ssrc = %header.ssrc, expected = %expected, "discarding packet for unrecognised ssrc");
        return Disposition::Discarded { ssrc: header.ssrc };
    }

    Disposition::Delivered {
        accepted: target.handle_packet(packet),
    }
}

/// Holds the identity a worker enforces.
///
/// Starts unset and pins the first non-zero identity reported by the target.
/// After that the expected identity never changes.
#[derive(Debug, Default)]
pub struct IdentityGate {
    pinned: StreamIdentity,
}

impl IdentityGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pinned: StreamIdentity::UNSET,
        }
    }

    /// Identity to enforce for the next packet, given what the target reports now.
    pub fn expected(&mut self, reported: StreamIdentity) -> StreamIdentity {
        if self.pinned.is_unset() {
            if !reported.is_unset() {
                debug!(ssrc = %reported, "pinning stream identity");
            }
            self.pinned = reported;
        } else if reported != self.pinned {
            trace!(pinned = %self.pinned, reported = %reported, "ignoring identity change");
        }
        self.pinned
    }

    #[must_use]
    pub const fn pinned(&self) -> StreamIdentity {
        self.pinned
    }
}
