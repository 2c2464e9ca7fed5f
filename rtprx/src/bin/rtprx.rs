//! Receive a single RTP stream and print its packet headers.
//!
//! # Usage
//!
//! ```sh
//! rtprx --port 5004 --ssrc 0x1234abcd --timeout 3
//! ```
//!
//! Exits when the stream ends: no packets for `--timeout` seconds, or a
//! zero-length datagram.
//!
//! # Signals
//!
//! - `SIGINT` / `SIGTERM`: trigger the shutdown signal; the worker closes its
//!   socket within one poll timeout. A second signal exits immediately.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use rtprx::net::AddressFamily;
use rtprx::rtp::{RtpHeader, StreamIdentity};
use rtprx::runtime::{ReceiveWorker, ShutdownSignal, WorkerConfig, WorkerError};
use rtprx::session::{SessionControl, StreamTarget};

/// Default RTP data port.
const DEFAULT_PORT: u16 = 5004;

#[derive(Debug, Error)]
enum ArgsError {
    #[error("missing value for {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: &'static str, value: String },
    #[error("unknown argument: {0}")]
    Unknown(String),
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Args(#[from] ArgsError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
}

struct Args {
    host: Option<IpAddr>,
    port: u16,
    ssrc: StreamIdentity,
    family: AddressFamily,
    config: WorkerConfig,
}

/// Prints every admitted packet.
struct PrintingTarget {
    host: Option<IpAddr>,
    port: u16,
    ssrc: StreamIdentity,
}

impl StreamTarget for PrintingTarget {
    fn ssrc(&self) -> StreamIdentity {
        self.ssrc
    }

    fn local_host(&self) -> Option<IpAddr> {
        self.host
    }

    fn local_data_port(&self) -> u16 {
        self.port
    }

    fn handle_packet(&self, packet: &[u8]) -> bool {
        let Ok(h) = RtpHeader::parse(packet) else {
            return false;
        };
        println!(
            "ssrc={} seq={} ts={} pt={} m={} len={}",
            h.ssrc,
            h.sequence,
            h.timestamp,
            h.payload_type,
            u8::from(h.marker),
            packet.len()
        );
        true
    }
}

/// Wakes `main` when the worker reports the stream gone.
struct ExitOnStop {
    family: AddressFamily,
    done: Mutex<Option<Sender<()>>>,
}

impl SessionControl for ExitOnStop {
    fn address_family(&self) -> AddressFamily {
        self.family
    }

    fn stop(&self) {
        if let Some(done) = self.done.lock().ok().and_then(|mut d| d.take()) {
            let _ = done.send(());
        }
    }
}

fn main() {
    rtprx::init_tracing();

    if let Err(e) = run() {
        eprintln!("rtprx: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().collect();
    let Some(args) = parse_args(&args)? else {
        print_usage();
        return Ok(());
    };

    let (done_tx, done_rx) = mpsc::channel();
    let session = Arc::new(ExitOnStop {
        family: args.family,
        done: Mutex::new(Some(done_tx)),
    });
    let target = Arc::new(PrintingTarget {
        host: args.host,
        port: args.port,
        ssrc: args.ssrc,
    });

    let shutdown = ShutdownSignal::new();
    setup_signal_handlers(shutdown.clone()).map_err(CliError::Signal)?;

    let worker = ReceiveWorker::start(session, target, shutdown, args.config)?;
    eprintln!("rtprx: listening on {}", worker.local_addr());

    // sender is dropped with the session if the worker never notifies
    let _ = done_rx.recv();

    let stats = worker.stats();
    worker.shutdown();
    eprintln!(
        "rtprx: stream ended ({} received, {} delivered, {} discarded, {} malformed)",
        stats.received, stats.delivered, stats.discarded, stats.malformed
    );
    Ok(())
}

/// Triggers `shutdown` on the first SIGINT/SIGTERM; exits on the second.
#[cfg(unix)]
fn setup_signal_handlers(shutdown: ShutdownSignal) -> io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signal-handler".into())
        .spawn(move || {
            for (count, signal) in signals.forever().enumerate() {
                if count > 0 {
                    std::process::exit(128 + signal);
                }
                eprintln!("\nrtprx: received signal {signal}, shutting down");
                shutdown.trigger();
            }
        })?;
    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: ShutdownSignal) -> io::Result<()> {
    Ok(())
}

/// Returns `Ok(None)` when help was requested.
fn parse_args(args: &[String]) -> Result<Option<Args>, ArgsError> {
    let mut parsed = Args {
        host: None,
        port: DEFAULT_PORT,
        ssrc: StreamIdentity::UNSET,
        family: AddressFamily::Inet,
        config: WorkerConfig::default(),
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let flag: &'static str = match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--ipv6" | "-6" => {
                parsed.family = AddressFamily::Inet6;
                continue;
            }
            "--bind" | "-b" => "--bind",
            "--port" | "-p" => "--port",
            "--ssrc" | "-s" => "--ssrc",
            "--timeout" | "-t" => "--timeout",
            "--recv-buffer" => "--recv-buffer",
            other => return Err(ArgsError::Unknown(other.to_string())),
        };
        let value = iter.next().ok_or(ArgsError::MissingValue(flag))?;
        let invalid = || ArgsError::InvalidValue {
            flag,
            value: value.clone(),
        };

        match flag {
            "--bind" => parsed.host = Some(value.parse().map_err(|_| invalid())?),
            "--port" => parsed.port = value.parse().map_err(|_| invalid())?,
            "--ssrc" => parsed.ssrc = parse_ssrc(value).ok_or_else(invalid)?,
            "--timeout" => {
                let secs: f64 = value.parse().map_err(|_| invalid())?;
                parsed.config.poll_timeout =
                    Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
            }
            "--recv-buffer" => {
                parsed.config.recv_buffer_size = Some(value.parse().map_err(|_| invalid())?);
            }
            _ => unreachable!(),
        }
    }

    Ok(Some(parsed))
}

/// Accepts decimal or `0x`-prefixed hex.
fn parse_ssrc(value: &str) -> Option<StreamIdentity> {
    let raw = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => value.parse().ok()?,
    };
    Some(StreamIdentity::new(raw))
}

fn print_usage() {
    eprintln!(
        r#"rtprx - receive one RTP stream

USAGE:
    rtprx [OPTIONS]

OPTIONS:
    -b, --bind <IP>          Local address (default: wildcard)
    -6, --ipv6               Bind the IPv6 wildcard when --bind is absent
    -p, --port <PORT>        RTP data port (default: 5004)
    -s, --ssrc <SSRC>        Expected SSRC, decimal or 0x-hex (default: any)
    -t, --timeout <SECS>     End the stream after this long without packets (default: 3)
        --recv-buffer <N>    Socket receive buffer size in bytes
    -h, --help               Print this help message
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        std::iter::once("rtprx")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn sigterm_triggers_shutdown() {
        let shutdown = ShutdownSignal::new();
        setup_signal_handlers(shutdown.clone()).unwrap();

        signal_hook::low_level::raise(signal_hook::consts::SIGTERM).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !shutdown.is_triggered() {
            assert!(std::time::Instant::now() < deadline, "signal never observed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn defaults() {
        let args = parse_args(&argv(&[])).unwrap().unwrap();
        assert_eq!(args.port, DEFAULT_PORT);
        assert!(args.ssrc.is_unset());
        assert!(args.host.is_none());
        assert_eq!(args.config.poll_timeout, Duration::from_secs(3));
    }

    #[test]
    fn parses_all_flags() {
        let args = parse_args(&argv(&[
            "--bind",
            "::1",
            "-p",
            "7000",
            "--ssrc",
            "0x1234ABCD",
            "-t",
            "0.5",
            "--recv-buffer",
            "1048576",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(args.host, Some("::1".parse().unwrap()));
        assert_eq!(args.port, 7000);
        assert_eq!(args.ssrc, StreamIdentity::new(0x1234_ABCD));
        assert_eq!(args.config.poll_timeout, Duration::from_millis(500));
        assert_eq!(args.config.recv_buffer_size, Some(1_048_576));
    }

    #[test]
    fn decimal_ssrc() {
        assert_eq!(parse_ssrc("42"), Some(StreamIdentity::new(42)));
        assert_eq!(parse_ssrc("0xZZ"), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            parse_args(&argv(&["--port"])),
            Err(ArgsError::MissingValue("--port"))
        ));
        assert!(matches!(
            parse_args(&argv(&["--port", "99999"])),
            Err(ArgsError::InvalidValue { flag: "--port", .. })
        ));
        assert!(matches!(
            parse_args(&argv(&["--timeout", "-1"])),
            Err(ArgsError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_args(&argv(&["--frobnicate"])),
            Err(ArgsError::Unknown(_))
        ));
        assert!(parse_args(&argv(&["-h"])).unwrap().is_none());
    }
}
