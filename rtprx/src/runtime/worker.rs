//! Per-stream receive worker.
//!
//! # Architecture
//!
//! A [`ReceiveWorker`] owns one UDP socket and one thread. The thread runs a
//! readiness loop over a [`mio::Poll`] with a bounded timeout:
//!
//! ```text
//! poll(timeout) ──empty──> timeout: stop
//!     │
//!     └─readable──> drain socket ──0 bytes──> stop
//!                        │
//!                        └─n bytes──> parse ─> identity gate ─> StreamTarget
//! ```
//!
//! Two tokens are registered: the socket and a [`mio::Waker`] used by
//! [`ReceiveWorker::stop`] to cut a pending poll short. Any other token is a
//! registration bug.
//!
//! # Termination
//!
//! The loop ends on whichever comes first:
//! - the process-wide [`ShutdownSignal`] (checked every iteration),
//! - a local stop request (any thread, any number of times),
//! - a zero-length read, a poll timeout, or a poll/receive error.
//!
//! On exit the loop drops the socket, then calls [`SessionControl::stop`]
//! exactly once so the owning session can tear down. The handle joins the
//! thread on drop, except when dropped from the worker thread itself (a
//! session reacting to that notification), where joining would deadlock.
//!
//! A worker never restarts. The session builds a new one per stream.
//!
//! # Example
//!
//! ```ignore
//! let worker = ReceiveWorker::start(session, target, shutdown.clone(), WorkerConfig::default())?;
//! // ... stream runs ...
//! worker.shutdown();
//! ```

mod rx_loop;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::{Interest, Poll, Token, Waker};
use thiserror::Error;

use crate::net::{Endpoint, UdpSocket};
use crate::rtp::{Disposition, HEADER_SIZE};
use crate::session::{SessionControl, StreamTarget};
use crate::trace::{debug, error, info, warn};

use super::ShutdownSignal;
use rx_loop::RxLoop;

/// Default poll timeout. No datagram for this long ends the stream.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest datagram received in full; longer ones are truncated.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 65_535;

const SOCKET: Token = Token(0);
const WAKER: Token = Token(1);

/// Tunables for a receive worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long one poll may wait. An empty wait ends the stream.
    pub poll_timeout: Duration,
    /// Receive buffer length.
    pub max_datagram_size: usize,
    /// `SO_RCVBUF` to request, if any. Failure to apply it is logged, not fatal.
    pub recv_buffer_size: Option<usize>,
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            recv_buffer_size: None,
            thread_name: "rtprx-data".into(),
        }
    }
}

impl WorkerConfig {
    /// Checks values that would make the loop end a healthy stream.
    ///
    /// A buffer shorter than an RTP header truncates real packets, and an
    /// empty one reads every datagram as zero bytes (end of stream). A zero
    /// poll timeout expires before anything can arrive.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.max_datagram_size < HEADER_SIZE {
            return Err(WorkerError::Config {
                field: "max_datagram_size",
                reason: "must hold at least an RTP fixed header",
            });
        }
        if self.poll_timeout.is_zero() {
            return Err(WorkerError::Config {
                field: "poll_timeout",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

/// Errors that prevent a worker from starting. No thread exists afterwards.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid worker config: {field} {reason}")]
    Config {
        field: &'static str,
        reason: &'static str,
    },
    #[error("failed to bind RTP socket to {endpoint}: {source}")]
    Bind {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
    #[error("failed to set up readiness poll: {0}")]
    Poll(#[source] io::Error),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Lifecycle of a worker. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl WorkerState {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::StopRequested,
            _ => Self::Stopped,
        }
    }
}

/// Point-in-time copy of a worker's datagram counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Non-empty datagrams read from the socket.
    pub received: u64,
    /// Datagrams handed to the stream target.
    pub delivered: u64,
    /// Delivered datagrams the target accepted.
    pub accepted: u64,
    /// Datagrams dropped for a foreign SSRC.
    pub discarded: u64,
    /// Datagrams too short to carry an RTP header.
    pub malformed: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    delivered: AtomicU64,
    accepted: AtomicU64,
    discarded: AtomicU64,
    malformed: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: Disposition) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Disposition::Malformed(_) => &self.malformed,
            Disposition::Discarded { .. } => &self.discarded,
            Disposition::Delivered { accepted } => {
                if accepted {
                    self.accepted.fetch_add(1, Ordering::Relaxed);
                }
                &self.delivered
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the handle, stop handles, and the worker thread.
struct Shared {
    state: AtomicU8,
    stop_requested: AtomicBool,
    waker: Waker,
    counters: Counters,
}

impl Shared {
    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `from` → `to`; no-op if the state has already moved on.
    fn advance(&self, from: WorkerState, to: WorkerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Sets the stop flag and wakes the poll. Only the first call does anything.
    fn request_stop(&self) {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.advance(WorkerState::Running, WorkerState::StopRequested);
        if let Err(_e) = self.waker.wake() {
            // the loop still sees the flag after at most one poll timeout
            warn!(error = %_e, "failed to wake receive loop");
        }
    }
}

/// Cloneable, thread-safe way to stop a worker without owning it.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Same as [`ReceiveWorker::stop`].
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }
}

/// Owning handle to a running receive worker.
///
/// Dropping the handle stops the worker and waits for its thread.
pub struct ReceiveWorker {
    shared: Arc<Shared>,
    local_addr: Endpoint,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveWorker {
    /// Binds the stream's socket and starts the receive thread.
    ///
    /// The bind address is the target's local host if it has one, otherwise
    /// the wildcard address of the session's family, on the target's data
    /// port.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::Config`] if `config` fails [`WorkerConfig::validate`].
    /// - [`WorkerError::Bind`] if the socket cannot be bound.
    /// - [`WorkerError::Poll`] if the poll or waker cannot be set up.
    /// - [`WorkerError::Spawn`] if the thread cannot be created.
    ///
    /// In every case nothing is left running and the session is not notified.
    pub fn start(
        session: Arc<dyn SessionControl>,
        target: Arc<dyn StreamTarget>,
        shutdown: ShutdownSignal,
        config: WorkerConfig,
    ) -> Result<Self, WorkerError> {
        config.validate()?;

        let endpoint = Endpoint::for_stream(
            target.local_host(),
            session.address_family(),
            target.local_data_port(),
        );

        info!(
            ssrc = %target.ssrc(),
            bind_addr = %endpoint,
            poll_timeout_ms = u64::try_from(config.poll_timeout.as_millis()).unwrap_or(u64::MAX),
            "starting RTP receive worker"
        );

        let mut socket = UdpSocket::bind(endpoint).map_err(|source| {
            error!(bind_addr = %endpoint, error = %source, "failed to bind RTP socket");
            WorkerError::Bind { endpoint, source }
        })?;

        if let Some(size) = config.recv_buffer_size {
            if let Err(_e) = socket.set_recv_buffer_size(size) {
                warn!(size, error = %_e, "could not set receive buffer size");
            }
        }

        let local_addr = socket
            .local_addr()
            .map_err(|source| WorkerError::Bind { endpoint, source })?;
        debug!(local_addr = %local_addr, "bound RTP socket");

        let poll = Poll::new().map_err(WorkerError::Poll)?;
        poll.registry()
            .register(&mut socket, SOCKET, Interest::READABLE)
            .map_err(WorkerError::Poll)?;
        let waker = Waker::new(poll.registry(), WAKER).map_err(WorkerError::Poll)?;

        let shared = Arc::new(Shared {
            state: AtomicU8::new(WorkerState::Created as u8),
            stop_requested: AtomicBool::new(false),
            waker,
            counters: Counters::default(),
        });

        let rx = RxLoop::new(
            socket,
            poll,
            Arc::clone(&shared),
            session,
            target,
            shutdown,
            &config,
        );

        shared.advance(WorkerState::Created, WorkerState::Running);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                info!("RTP receive thread started");
                rx.run();
                info!("RTP receive thread exiting");
            })
            .map_err(|e| {
                error!(error = %e, "failed to spawn RTP receive thread");
                shared.advance(WorkerState::Running, WorkerState::Stopped);
                WorkerError::Spawn(e)
            })?;

        Ok(Self {
            shared,
            local_addr,
            handle: Some(handle),
        })
    }

    /// Asks the loop to exit. Idempotent, callable from any thread, never blocks.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// A handle other threads (or the session) can use to stop this worker.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.shared.counters.snapshot()
    }

    /// Address the socket was bound to (resolves port 0).
    #[must_use]
    pub const fn local_addr(&self) -> Endpoint {
        self.local_addr
    }

    /// `true` once the worker thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the worker and waits for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shared.request_stop();

        let Some(handle) = self.handle.take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            // dropped from our own session callback; the thread is already unwinding its loop
            debug!("receive worker released from its own thread, not joining");
            return;
        }

        debug!("waiting for RTP receive thread to exit");
        if handle.join().is_err() {
            error!("RTP receive thread panicked");
        }
    }
}

impl Drop for ReceiveWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtp::HeaderError;
    use crate::rtp::StreamIdentity;

    #[test]
    fn state_order_is_lifecycle_order() {
        assert!(WorkerState::Created < WorkerState::Running);
        assert!(WorkerState::Running < WorkerState::StopRequested);
        assert!(WorkerState::StopRequested < WorkerState::Stopped);
        for state in [
            WorkerState::Created,
            WorkerState::Running,
            WorkerState::StopRequested,
            WorkerState::Stopped,
        ] {
            assert_eq!(WorkerState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_secs(3));
        assert_eq!(config.max_datagram_size, 65_535);
        assert!(config.recv_buffer_size.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_buffer_shorter_than_header() {
        for size in [0, 1, HEADER_SIZE - 1] {
            let config = WorkerConfig {
                max_datagram_size: size,
                ..WorkerConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(WorkerError::Config {
                    field: "max_datagram_size",
                    ..
                })
            ));
        }

        let header_only = WorkerConfig {
            max_datagram_size: HEADER_SIZE,
            ..WorkerConfig::default()
        };
        assert!(header_only.validate().is_ok());
    }

    #[test]
    fn rejects_zero_poll_timeout() {
        let config = WorkerConfig {
            poll_timeout: Duration::ZERO,
            ..WorkerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WorkerError::Config {
                field: "poll_timeout",
                ..
            })
        ));

        let short = WorkerConfig {
            poll_timeout: Duration::from_millis(1),
            ..WorkerConfig::default()
        };
        assert!(short.validate().is_ok());
    }

    #[test]
    fn counters_classify_outcomes() {
        let counters = Counters::default();
        counters.record(Disposition::Delivered { accepted: true });
        counters.record(Disposition::Delivered { accepted: false });
        counters.record(Disposition::Discarded {
            ssrc: StreamIdentity::new(1),
        });
        counters.record(Disposition::Malformed(HeaderError::TooShort { need: 12, have: 3 }));

        assert_eq!(
            counters.snapshot(),
            WorkerStats {
                received: 4,
                delivered: 2,
                accepted: 1,
                discarded: 1,
                malformed: 1,
            }
        );
    }
}
