//! Hub binary: bind the configured port and serve forever.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "netspan-hub",
    version,
    about = "Aggregation hub for netspan sniffers and viewers"
)]
struct Cli {
    /// TCP port to listen on (all interfaces)
    port: u16,
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

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind port {}: {e}", cli.port);
            std::process::exit(1);
        },
    };

    tracing::info!(port = cli.port, "hub listening");

    if let Err(e) = netspan_hub::serve(listener).await {
        eprintln!("hub terminated: {e}");
        std::process::exit(1);
    }
}
