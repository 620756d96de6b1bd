//! MetricIO Server - metric store daemon
//!
//! This binary serves the MetricIO wire protocol over TCP.

mod service;

use anyhow::Result;
use clap::Parser;
use metricio_common::Config;
use metricio_storage::Database;
use service::Server;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "metricio-server")]
#[command(about = "MetricIO metric store daemon")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/metricio/server.toml")]
    config: String,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Database directory
    #[arg(short, long)]
    db_dir: Option<PathBuf>,

    /// Worker pool size
    #[arg(short, long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file if it exists
    let config: Config = if std::path::Path::new(&args.config).exists() {
        let raw = std::fs::read_to_string(&args.config)?;
        toml::from_str(&raw).unwrap_or_else(|e| {
            eprintln!("Warning: failed to parse config file: {e}");
            Config::default()
        })
    } else {
        Config::default()
    };

    // Merge CLI args with config file (CLI takes precedence)
    let port = args.port.unwrap_or(config.server.port);
    let workers = args.workers.unwrap_or(config.server.workers);
    let db_dir = args.db_dir.unwrap_or(config.storage.db_dir);
    let log_level = if args.log_level == "info" {
        config.logging.level
    } else {
        args.log_level
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MetricIO server");
    info!("Config file: {}", args.config);
    info!("Database directory: {}", db_dir.display());

    let db = Arc::new(Database::open(&db_dir)?);
    let server = Server::new(db, workers);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on 0.0.0.0:{port} with {workers} workers");

    tokio::select! {
        result = server.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
    }

    Ok(())
}
