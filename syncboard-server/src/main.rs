//! Syncboard server -- realtime collaborative task board backend.
//!
//! A WebSocket server that synchronizes personal and team task boards
//! across live connections, persisting every mutation to SQLite before
//! re-broadcasting it.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:4000
//! cargo run --bin syncboard-server
//!
//! # Run on custom address with a custom database
//! cargo run --bin syncboard-server -- --bind 127.0.0.1:8080 --database-url sqlite://board.db
//!
//! # Or via environment variables
//! SYNCBOARD_ADDR=127.0.0.1:8080 cargo run --bin syncboard-server
//! ```

use std::sync::Arc;

use clap::Parser;
use syncboard_server::config::{ServerCliArgs, ServerConfig};
use syncboard_server::router::TaskRouter;
use syncboard_server::server;
use syncboard_server::store::TaskStore;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, db = %config.database_url, "starting syncboard server");

    let store = match TaskStore::open(&config.database_url).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to open task store");
            std::process::exit(1);
        }
    };
    let router = Arc::new(TaskRouter::new(store));

    match server::start_server_with_state(&config.bind_addr, router).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "syncboard server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    }
}
