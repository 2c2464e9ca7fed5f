//! Contracts between a receive worker and the session that owns it.
//!
//! The session negotiates the stream (port, identity, address family) and
//! supplies two collaborators: a [`StreamTarget`] that consumes packets, and
//! a [`SessionControl`] that is told when the data channel is gone. Both are
//! shared with the worker thread, hence `Send + Sync`.

use std::net::IpAddr;

use crate::net::AddressFamily;
use crate::rtp::StreamIdentity;

/// The stream a worker receives for: its negotiated parameters and the
/// reassembler that consumes admitted packets.
pub trait StreamTarget: Send + Sync {
    /// Expected SSRC, or [`StreamIdentity::UNSET`] while it is still unknown.
    ///
    /// Queried per packet until it first returns a non-zero value; the worker
    /// pins that value for the rest of its life.
    fn ssrc(&self) -> StreamIdentity;

    /// Local address to bind, if the session negotiated one.
    fn local_host(&self) -> Option<IpAddr> {
        None
    }

    /// Local UDP port negotiated for RTP data. Zero lets the OS choose.
    fn local_data_port(&self) -> u16;

    /// Consumes one admitted packet (full datagram, header included).
    ///
    /// The return value reports acceptance only; it never stops the worker.
    fn handle_packet(&self, packet: &[u8]) -> bool;
}

/// The owning session, as seen from its data worker.
pub trait SessionControl: Send + Sync {
    /// Family to use for the wildcard bind when no local host is set.
    fn address_family(&self) -> AddressFamily;

    /// Called exactly once, from the worker thread, after the worker's loop
    /// has exited and its socket is closed. The session should tear itself
    /// down; it may call back into the worker (stop, drop) safely.
    fn stop(&self);
}
