//! Sniffer agent binary.
//!
//! `netspan-agent <interface>` decodes live traffic to stdout;
//! `netspan-agent <interface> <server_ip> <server_port>` ships records
//! to an aggregation hub instead. SIGINT/SIGTERM terminate the agent.

mod capture;
mod sink;
mod tap;
mod uplink;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::tap::BpfTap;

/// Records buffered between the capture thread and the uplink task
/// before tap backpressure kicks in.
const UPLINK_QUEUE: usize = 1024;

#[derive(Parser, Debug)]
#[command(
    name = "netspan-agent",
    version,
    about = "BPF packet sniffer; standalone or reporting to a netspan hub"
)]
struct Cli {
    /// Network interface to capture on (e.g. en0)
    interface: String,

    /// Hub address; requires a port as well
    #[arg(requires = "server_port")]
    server_ip: Option<String>,

    /// Hub port
    server_port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tap = match BpfTap::open(&cli.interface) {
        Ok(tap) => tap,
        Err(e) => {
            eprintln!("failed to open capture tap for {}: {e}", cli.interface);
            std::process::exit(1);
        },
    };

    match (&cli.server_ip, cli.server_port) {
        (Some(ip), Some(port)) => {
            let stream = match tokio::net::TcpStream::connect((ip.as_str(), port)).await {
                Ok(stream) => stream,
                Err(e) => {
                    eprintln!("failed to connect to hub {ip}:{port}: {e}");
                    std::process::exit(1);
                },
            };

            let (tx, rx) = mpsc::channel(UPLINK_QUEUE);
            std::thread::spawn(move || capture::run(tap, sink::ChannelSink::new(tx)));

            let hostname = hostname();
            tokio::select! {
                () = shutdown_signal() => {
                    info!("signal received, stopping");
                    std::process::exit(0);
                }
                result = uplink::run(stream, &hostname, &cli.interface, rx) => {
                    if let Err(e) = result {
                        eprintln!("uplink failed: {e}");
                        std::process::exit(1);
                    }
                }
            }
        },
        _ => {
            std::thread::spawn(move || capture::run(tap, sink::StdoutSink));
            shutdown_signal().await;
            info!("signal received, stopping");
            std::process::exit(0);
        },
    }
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();

    match sigterm {
        Some(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        },
        None => {
            let _ = tokio::signal::ctrl_c().await;
        },
    }
}

/// Hostname reported in the hello, best effort.
fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc == 0 {
        if let Ok(name) = std::ffi::CStr::from_bytes_until_nul(&buf) {
            return name.to_string_lossy().into_owned();
        }
    }
    "unknown".to_string()
}
