//! # order-service
//!
//! Starts the Orderline order service.
//!
//! ```text
//! config (file + env) ──► SQLite pool + migrations
//!                     ──► transport (Redis, or in-process when no URL)
//!                     ──► EventHub + relay
//!                     ──► AppState ──► axum (/ws/terminals, /health)
//!
//! SIGINT / SIGTERM ──► graceful shutdown ──► stop relay ──► close pool
//! ```
//!
//! Usage: `order-service [--config <path>]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use orderline_db::Database;
use orderline_hub::{BroadcastTransport, EventHub, MemoryTransport, RedisTransport};
use orderline_service::{terminal_ws, AppState, ServiceConfig};

const DEFAULT_LOG_FILTER: &str = "info,orderline=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    let config = ServiceConfig::load(parse_config_arg()?).context("loading configuration")?;
    info!(
        database = %config.database.path.display(),
        bind = %config.server.bind_addr,
        channel = %config.hub.channel,
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;

    let transport: Arc<dyn BroadcastTransport> = match &config.hub.redis_url {
        Some(url) => Arc::new(
            RedisTransport::connect(url)
                .await
                .context("connecting to Redis")?,
        ),
        None => {
            warn!("No Redis URL configured, events stay within this instance");
            Arc::new(MemoryTransport::new())
        }
    };
    let hub = Arc::new(EventHub::new(transport, &config.hub));
    let relay = hub.start_relay(&config.hub).await;

    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::new(config, db.clone(), hub));
    let app = terminal_ws::router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "Order service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    relay.shutdown().await;
    db.close().await;
    info!("Order service stopped");
    Ok(())
}

fn parse_config_arg() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(value) => path = Some(PathBuf::from(value)),
                None => bail!("--config needs a path"),
            },
            "--help" | "-h" => {
                println!("Usage: order-service [--config <path>]");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(path)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
