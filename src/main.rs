//! Health check service.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                  HEALTH CHECK                     │
//!                 │                                                   │
//!   dependency ◀──┼── checker ◀── Ticker (jitter, cap 5) ◀─┐          │
//!                 │      │                                 │          │
//!                 │      ▼                                 │          │
//!                 │  CheckState ──callback──▶ HealthCheck ─┘          │
//!                 │                      │  (hysteresis, cache)       │
//!                 │                      ├──▶ subscribers             │
//!   GET /health ──┼──▶ http server ──────┘                            │
//!                 └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use healthcheck::config::{load_config, ServiceConfig};
use healthcheck::lifecycle::{build_health_check, wait_for_signal, Shutdown};
use healthcheck::observability::{logging, metrics};
use healthcheck::{BoxError, CheckState, HttpServer, Status, VersionInfo};

#[derive(Parser)]
#[command(name = "healthcheck")]
#[command(about = "Monitor service dependencies and serve /health", long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Register a check that reports a random status
    #[arg(long)]
    demo: bool,
}

fn version_info() -> VersionInfo {
    let git_commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
    let version = env!("CARGO_PKG_VERSION");
    match VersionInfo::new(option_env!("BUILD_TIME").unwrap_or("0"), git_commit, version) {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(error = %e, "Falling back to epoch build time");
            VersionInfo::with_epoch_build_time(git_commit, version)
        }
    }
}

async fn random_checker(
    _cancel: CancellationToken,
    state: Arc<CheckState>,
) -> Result<(), BoxError> {
    let (status, code) = match fastrand::u8(0..10) {
        0 => (Status::Critical, 500),
        1 | 2 => (Status::Warning, 429),
        _ => (Status::Ok, 200),
    };
    state.update(status, format!("demo dependency is {status}"), code)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("healthcheck v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        interval_secs = config.health.interval_secs,
        critical_error_timeout_secs = config.health.critical_error_timeout_secs,
        checks = config.checks.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let health = build_health_check(&config, version_info())?;
    if args.demo {
        health.add_check("demo", random_checker)?;
    }

    let shutdown = Shutdown::new();
    health.start(shutdown.subscribe());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(health.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }
    health.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
