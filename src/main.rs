//! Upstream bridge daemon.
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                UPSTREAM BRIDGE               │
//!   HTTP clients      │  ┌────────┐   ┌────────┐   ┌──────────────┐  │
//!   ──────────────────┼─▶│  http  │──▶│ bridge │──▶│   upstream   │──┼──▶ upstream
//!   ◀─────────────────┼──│ server │◀──│ facade │◀──│   manager    │◀─┼─── (one WS)
//!                     │  └────────┘   └───┬────┘   └──────┬───────┘  │
//!                     │                   │               │          │
//!                     │             ┌─────▼──────┐  ┌─────▼──────┐   │
//!                     │             │ resilience │  │ correlation│   │
//!                     │             │  retries   │  │  + sweeper │   │
//!                     │             └────────────┘  └────────────┘   │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use upstream_bridge::config::{self, BridgeConfig};
use upstream_bridge::http::HttpServer;
use upstream_bridge::lifecycle::wait_for_signal;
use upstream_bridge::observability::{logging, metrics};
use upstream_bridge::Bridge;

#[derive(Parser)]
#[command(name = "upstream-bridge")]
#[command(about = "Resilient request/response bridge to an upstream WebSocket service", long_about = None)]
struct Args {
    /// TOML config file; defaults plus BRIDGE_* overrides when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_default()?,
    };

    logging::init(&loaded.config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upstream-bridge starting");
    loaded.log_ignored();
    let config: BridgeConfig = loaded.config;
    tracing::info!(
        upstream = %config.upstream.url,
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.requests.timeout_ms,
        retries_enabled = config.retries.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bridge = Arc::new(Bridge::from_config(&config)?);
    bridge.start();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(Arc::clone(&bridge), &config.security);
    server.run(listener, wait_for_signal()).await?;

    bridge.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
