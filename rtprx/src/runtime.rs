//! Threads and lifecycle.
//!
//! - `worker`: the per-stream receive worker and its loop.
//! - `shutdown`: the process-wide signal every worker observes.

pub mod shutdown;
pub mod worker;

pub use shutdown::ShutdownSignal;
pub use worker::{ReceiveWorker, StopHandle, WorkerConfig, WorkerError, WorkerState, WorkerStats};
