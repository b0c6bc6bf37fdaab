//! Workload server run inside each backend instance.

use clap::Parser;
use tokio::net::TcpListener;

use container_router::lifecycle::signals;
use container_router::observability::logging;
use container_router::workload::{app, WorkloadState};

#[derive(Parser)]
#[command(name = "workload-server")]
#[command(about = "Placeholder workload for container router instances", long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&logging::default_filter("container_router", &cli.log_level));

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Workload server listening");

    axum::serve(listener, app(WorkloadState::default()))
        .with_graceful_shutdown(signals::wait_for_signal())
        .await?;

    tracing::info!("Workload server stopped");
    Ok(())
}
