//! Per-stream RTP receive worker.
//!
//! A session that has negotiated an RTP stream starts one
//! [`ReceiveWorker`](runtime::ReceiveWorker) for it. The worker binds the
//! stream's UDP port, waits for datagrams on its own thread, drops anything
//! that is too short or carries a foreign SSRC, and hands the rest to the
//! session's [`StreamTarget`](session::StreamTarget). When the stream dies
//! (stop request, process shutdown, timeout, socket closure) the worker closes
//! its socket and tells the session via
//! [`SessionControl::stop`](session::SessionControl::stop).

pub mod net;
pub mod rtp;
pub mod runtime;
pub mod session;

mod trace;

pub use trace::init_tracing;
