//! Main entry point for the articlemeta-dump CLI

use articlemeta_dump::cli::Cli;
use articlemeta_dump::metrics::init_metrics;
use articlemeta_dump::shutdown::ShutdownCoordinator;
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Exit status after a Ctrl+C
const EXIT_CANCELLED: i32 = 130;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("articlemeta_dump=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = init_metrics(addr) {
            error!("Could not start metrics exporter: {}", e);
            std::process::exit(1);
        }
    }

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - finishing in-flight downloads...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = cli.command.execute(&cli, shutdown).await;

    if let Err(e) = result {
        if e.is_cancelled() {
            warn!("Cancelled: {}", e);
            std::process::exit(EXIT_CANCELLED);
        }
        let e = anyhow::Error::new(e);
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
