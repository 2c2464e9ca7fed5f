//! The receive loop that runs on a worker's thread.

use std::io::ErrorKind;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use minstant::Instant;
use mio::{Events, Poll};

use crate::net::UdpSocket;
use crate::rtp::{IdentityGate, dispatch};
use crate::runtime::ShutdownSignal;
use crate::session::{SessionControl, StreamTarget};
use crate::trace::{debug, error, info, trace};

use super::{SOCKET, Shared, WAKER, WorkerConfig, WorkerState};

/// Readiness events fetched per poll: the socket and the waker.
const EVENT_CAPACITY: usize = 2;

pub(super) struct RxLoop {
    socket: UdpSocket,
    poll: Poll,
    events: Events,
    shared: Arc<Shared>,
    session: Arc<dyn SessionControl>,
    target: Arc<dyn StreamTarget>,
    shutdown: ShutdownSignal,
    gate: IdentityGate,
    poll_timeout: Duration,
    recv_buf: Vec<u8>,
    last_datagram: Instant,
}

impl RxLoop {
    pub(super) fn new(
        socket: UdpSocket,
        poll: Poll,
        shared: Arc<Shared>,
        session: Arc<dyn SessionControl>,
        target: Arc<dyn StreamTarget>,
        shutdown: ShutdownSignal,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            socket,
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            shared,
            session,
            target,
            shutdown,
            gate: IdentityGate::new(),
            poll_timeout: config.poll_timeout,
            recv_buf: vec![0u8; config.max_datagram_size],
            last_datagram: Instant::now(),
        }
    }

    /// Runs until stopped, then closes the socket and notifies the session.
    pub(super) fn run(mut self) {
        debug!(
            ssrc = %self.target.ssrc(),
            port = self.target.local_data_port(),
            "receive loop running"
        );

        while self.keep_running() {
            match self.poll.poll(&mut self.events, Some(self.poll_timeout)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // epoll_wait only fails on EBADF/EFAULT/EINVAL here, none
                // reachable while this loop owns the Poll
                Err(_e) => {
                    error!(error = %_e, "readiness poll failed");
                    break;
                }
            }

            if self.events.is_empty() {
                error!(
                    idle_ms = u64::try_from(self.last_datagram.elapsed().as_millis())
                        .unwrap_or(u64::MAX),
                    "RTP timed out"
                );
                self.shared.request_stop();
                break;
            }

            let readable = self.events.iter().fold(false, |readable, event| {
                match event.token() {
                    SOCKET => true,
                    WAKER => readable,
                    token => unreachable!("event for unregistered token {token:?}"),
                }
            });

            if readable && self.drain().is_break() {
                break;
            }
        }

        self.finish();
    }

    fn keep_running(&self) -> bool {
        if self.shutdown.is_triggered() {
            debug!("shutdown signal observed");
            return false;
        }
        !self.shared.stop_requested()
    }

    /// Reads datagrams until the socket would block.
    ///
    /// mio readiness is edge-triggered, so everything queued must be read
    /// before the next poll.
    fn drain(&mut self) -> ControlFlow<()> {
        while self.keep_running() {
            let (len, _from) = match self.socket.try_recv_from(&mut self.recv_buf) {
                Ok(Some(received)) => received,
                Ok(None) => return ControlFlow::Continue(()),
                // an unconnected UDP socket gets no ICMP errors, so this is
                // only hit on resource failures such as ENOMEM
                Err(_e) => {
                    error!(error = %_e, "RTP socket receive failed");
                    self.shared.request_stop();
                    return ControlFlow::Break(());
                }
            };

            trace!(bytes = len, from = %_from, "got datagram");

            if len == 0 {
                debug!("zero-length read, treating RTP socket as closed");
                self.shared.request_stop();
                return ControlFlow::Break(());
            }

            self.last_datagram = Instant::now();
            let expected = self.gate.expected(self.target.ssrc());
            let outcome = dispatch(&self.recv_buf[..len], expected, self.target.as_ref());
            self.shared.counters.record(outcome);
        }
        ControlFlow::Break(())
    }

    /// Closes the socket, then tells the session the data channel is gone.
    fn finish(self) {
        let Self {
            socket,
            poll,
            shared,
            session,
            ..
        } = self;

        shared.advance(WorkerState::Running, WorkerState::StopRequested);
        drop(poll);
        drop(socket);
        info!("RTP socket closed");

        session.stop();
        shared.advance(WorkerState::StopRequested, WorkerState::Stopped);
    }
}
