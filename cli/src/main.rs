// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Forge controller daemon
//!
//! The `forge` binary bootstraps the build controller: it loads the
//! process-wide defaults once from flags and `FORGE_*` environment
//! variables, initialises logging, and runs the reconciliation worker
//! pool until SIGINT/SIGTERM.
//!
//! All durable state lives in the platform record store; this process
//! keeps nothing of its own and can be restarted freely.

use aegis_forge_core::application::Controller;
use aegis_forge_core::domain::config::ControllerConfig;
use aegis_forge_core::domain::unit::PullPolicy;
use aegis_forge_core::infrastructure::InMemoryRecordStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// AEGIS Forge - reconcile build requests into execution units
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Namespace to watch and submit units into
    #[arg(long, env = "FORGE_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Default worker image when a project overrides none of the triple
    #[arg(
        long,
        env = "FORGE_WORKER_IMAGE",
        default_value = "100monkeys/forge-worker:latest"
    )]
    worker_image: String,

    /// Default image pull policy (IfNotPresent, Always, Never)
    #[arg(long, env = "FORGE_WORKER_PULL_POLICY", default_value = "IfNotPresent")]
    worker_pull_policy: String,

    /// Service account units run as (empty = platform default)
    #[arg(long, env = "FORGE_SERVICE_ACCOUNT", default_value = "")]
    service_account: String,

    /// Default worker entry command (whitespace-tokenized)
    #[arg(long, env = "FORGE_WORKER_COMMAND")]
    worker_command: Option<String>,

    /// Number of parallel reconciliation workers
    #[arg(long, env = "FORGE_WORKER_COUNT", default_value_t = 1)]
    worker_count: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FORGE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    // The default pull policy is operator-supplied configuration; an
    // unrecognized value fails the boot instead of every build.
    let worker_pull_policy: PullPolicy = cli
        .worker_pull_policy
        .parse()
        .context("invalid --worker-pull-policy")?;

    let config = Arc::new(ControllerConfig {
        namespace: cli.namespace,
        worker_image: cli.worker_image,
        worker_pull_policy,
        worker_service_account: cli.service_account,
        worker_command: cli.worker_command,
        worker_count: cli.worker_count,
    });

    // TODO wire the platform record-store client here once its Rust SDK
    // ships; the in-memory store only backs standalone runs.
    let store = Arc::new(InMemoryRecordStore::new());

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    Controller::new(store, config).run(shutdown).await;
    info!("shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
