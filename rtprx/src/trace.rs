//! Logging plumbing for the receive path.
//!
//! Built with `--features tracing`, the macros below are the `tracing` crate's
//! own and [`init_tracing`] installs a `fmt` subscriber. Without the feature
//! every event compiles away, so the per-datagram hot path carries no logging
//! cost at all.

/// Installs a global subscriber filtered by `RUST_LOG` (default `rtprx=debug`).
///
/// Safe to call more than once; later calls are ignored. Tests rely on that.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rtprx=debug"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! discard_event {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use discard_event as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard_event as error;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard_event as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard_event as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard_event as warn;
