//! amgridd — the amgrid application-master daemon.
//!
//! Single binary that assembles the engine:
//! - Grid, projections and container clusters (`ClusterManager`)
//! - Container monitor
//! - Reconcile loop
//! - Simulated resource manager
//! - REST API
//!
//! # Usage
//!
//! ```text
//! amgridd scaffold > amgrid.toml
//! amgridd standalone --config amgrid.toml --port 8080
//! ```

mod sim;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use amgrid_cluster::ClusterManager;
use amgrid_core::AmgridConfig;
use amgrid_core::config::parse_duration;
use amgrid_monitor::ContainerMonitorState;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::sim::{SimulatedResourceManager, Simulator};

const DEFAULT_LOG_FILTER: &str = "info,amgridd=debug,amgrid_cluster=debug,amgrid_grid=debug,amgrid_monitor=debug";

#[derive(Parser)]
#[command(name = "amgridd", about = "amgrid application-master daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run against an in-process simulated resource manager.
    Standalone {
        /// Path to amgrid.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `[api].port`).
        #[arg(long)]
        port: Option<u16>,

        /// Reconcile interval, e.g. "500ms" or "5s" (overrides the config).
        #[arg(long)]
        reconcile_interval: Option<String>,
    },

    /// Print a sample amgrid.toml.
    Scaffold {
        /// Id of the sample cluster.
        #[arg(long, default_value = "web")]
        cluster: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Standalone {
            config,
            port,
            reconcile_interval,
        } => run_standalone(config, port, reconcile_interval).await,
        Command::Scaffold { cluster } => {
            print!("{}", AmgridConfig::scaffold(&cluster).to_toml_string()?);
            Ok(())
        }
    }
}

async fn run_standalone(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    reconcile_interval: Option<String>,
) -> anyhow::Result<()> {
    info!("amgrid daemon starting in standalone mode");

    let config = match &config_path {
        Some(path) => {
            let config = AmgridConfig::from_file(path)?;
            info!(path = ?path, clusters = config.clusters.len(), "config loaded");
            config
        }
        None => AmgridConfig::default(),
    };
    let port = port.unwrap_or(config.api.port);
    let interval = match &reconcile_interval {
        Some(s) => parse_duration(s),
        None => config.reconcile_interval(),
    };

    // ── Initialize subsystems ──────────────────────────────────

    let (rm, rm_requests) = SimulatedResourceManager::channel();
    let manager = Arc::new(
        ClusterManager::new(Arc::new(rm)).with_blueprints(config.clusters.clone()),
    );
    info!(
        projection_types = ?manager.registered_projection_types(),
        "cluster manager initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sim_shutdown = shutdown_rx.clone();
    let reconcile_shutdown = shutdown_rx.clone();
    let monitor_shutdown = shutdown_rx.clone();

    // ── Start background tasks ─────────────────────────────────

    let simulator = Simulator::new(config.simulator.clone().unwrap_or_default());
    let sim_handle = tokio::spawn(simulator.run(manager.clone(), rm_requests, sim_shutdown));

    let started = manager.start_configured_clusters();
    info!(clusters = ?started, "configured clusters started");

    let reconcile_manager = manager.clone();
    let reconcile_handle = tokio::spawn(async move {
        reconcile_manager.run(interval, reconcile_shutdown).await;
    });

    let monitor_handle = tokio::spawn(log_monitor_changes(
        manager.monitor().subscribe(),
        monitor_shutdown,
    ));

    // ── Start API server ───────────────────────────────────────

    let router = amgrid_api::build_router(manager);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = reconcile_handle.await;
    let _ = sim_handle.await;
    let _ = monitor_handle.await;

    info!("amgrid daemon stopped");
    Ok(())
}

/// Log every published container monitor state until shutdown.
async fn log_monitor_changes(
    mut states: watch::Receiver<ContainerMonitorState>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                debug!(
                    allocated = state.allocated,
                    running = state.running,
                    completed = state.completed,
                    failed = state.failed,
                    progress = state.progress(),
                    "container monitor updated"
                );
            }
            _ = shutdown.changed() => break,
        }
    }
}
