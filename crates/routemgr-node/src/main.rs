//! Route manager entry point.
//!
//! Starts the route manager with configuration from a TOML file.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use routemgr_node::{HttpTransport, RouteManager, RouteManagerConfig};

/// Sharded connector route manager
#[derive(Parser, Debug)]
#[command(name = "routemgr-node", version, about = "Sharded connector route manager")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "routemgr.toml")]
    config: PathBuf,

    /// Override the internal API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the hold-down time, in milliseconds.
    #[arg(long)]
    hold_down_time: Option<u64>,

    /// Override the broadcast interval, in milliseconds.
    #[arg(long)]
    broadcast_interval: Option<u64>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Write an example config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init {
        init_tracing(args.log_level.as_deref().unwrap_or("info"), "text");
        let config = RouteManagerConfig::example();
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote example config");
        return Ok(());
    }

    let mut config = RouteManagerConfig::load(&args.config)?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.private_port = port;
    }
    if let Some(hold_down_time) = args.hold_down_time {
        config.hold_down_time_ms = hold_down_time;
    }
    if let Some(broadcast_interval) = args.broadcast_interval {
        config.broadcast_interval_ms = broadcast_interval;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level, &config.logging.format);
    tracing::info!("routemgr-node v{}", env!("CARGO_PKG_VERSION"));

    let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
    let mut manager = RouteManager::new(config, transport)?;
    let addr = manager.start().await?;
    tracing::info!(%addr, "route manager listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        _ = manager.run() => {}
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    manager.shutdown().await?;
    tracing::info!("route manager exited cleanly");
    Ok(())
}
