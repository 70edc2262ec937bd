//! GhostFrame rewriting proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────────────┐
//!                     │                      GHOSTFRAME                         │
//!                     │                                                         │
//!  GET /api/proxy     │  ┌────────┐   ┌─────────┐   ┌──────────┐               │
//!  ?url=example.com ──┼─▶│ target │──▶│  fetch  │──▶│ classify │               │
//!                     │  └────────┘   └─────────┘   └────┬─────┘               │
//!                     │                                  │                      │
//!                     │                   markup ┌───────┴───────┐ other        │
//!                     │                          ▼               ▼              │
//!                     │                  ┌──────────────┐  ┌─────────┐          │
//!                     │                  │   rewrite    │  │  relay  │          │
//!                     │                  │ base+script  │  │ stream  │          │
//!                     │                  └──────┬───────┘  └────┬────┘          │
//!                     │                         ▼               ▼               │
//!  rewritten page  ◀──┼──────────────── security::headers (CORS, no XFO/CSP)    │
//!                     │                                                         │
//!                     └────────────────────────────────────────────────────────┘
//!
//!  In the page: interceptor script → clicks / GET forms → GET /api/proxy?url=...
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ghostframe::config::loader::load_config;
use ghostframe::config::watcher::ConfigWatcher;
use ghostframe::lifecycle::signals::wait_for_shutdown_signal;
use ghostframe::observability::{logging, metrics};
use ghostframe::{HttpServer, ProxyConfig, Shutdown};

#[derive(Parser)]
#[command(name = "ghostframe")]
#[command(about = "Rewriting HTTP proxy for framed browsing", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults are used when omitted.
    #[arg(short, long, env = "GHOSTFRAME_CONFIG")]
    config: Option<PathBuf>,

    /// Watch the configuration file and apply changes without restarting.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability)?;

    tracing::info!("ghostframe v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoint = %config.endpoint.path,
        upstream_timeout_secs = config.timeouts.upstream_secs,
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

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
