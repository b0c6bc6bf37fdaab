//! Session-affine container router.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               CONTAINER ROUTER               │
//!                        │                                              │
//!     Client Request     │  ┌─────────┐    ┌──────────┐    ┌─────────┐  │
//!     ───────────────────┼─▶│  http   │───▶│ routing  │───▶│selector │  │
//!                        │  │ server  │    │ key/path │    │registry │  │
//!                        │  └────┬────┘    └──────────┘    └────┬────┘  │
//!                        │       │ unrouted                     │       │
//!                        │       ▼                              ▼       │
//!                        │  static assets               instance handle ┼──▶ Instance
//!     Client Response    │                                      │       │   (workload)
//!     ◀──────────────────┼──────────── streamed back ◀──────────┘       │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use container_router::config::{load_config, watcher::ConfigWatcher, RouterConfig};
use container_router::lifecycle::{signals, Shutdown};
use container_router::observability::{logging, metrics};
use container_router::HttpServer;

#[derive(Parser)]
#[command(name = "container-router")]
#[command(about = "Forward requests to session-affine backend instances", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    logging::init_logging(&logging::default_filter(
        "container_router",
        &config.observability.log_level,
    ));

    tracing::info!("container-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        instances = config.registry.instances.len(),
        resolve_ms = config.timeouts.resolve_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(config)
        .run(listener, config_updates, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
