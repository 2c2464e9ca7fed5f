//! Process-wide shutdown signal.
//!
//! One signal is created by the process (usually in `main`) and cloned into
//! every worker. Workers only observe it, at the top of each loop iteration,
//! so a worker notices within one poll timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable, set-once cancellation flag shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown of every worker observing this signal.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
