//! ==============================================================================
//! main.rs - waterlog host entry point
//! ==============================================================================
//!
//! purpose:
//!     polls the remote store for one device's water-quality log and serves
//!     the ten most recent readings as a web dashboard.
//!
//! responsibilities:
//!     - load configuration (config/waterlog.toml, or defaults)
//!     - set up logging
//!     - activate the poller (refresh now, then every interval)
//!     - serve the dashboard until ctrl-c
//!     - deactivate the poller on the way out
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                   rust host (this file)                   │
//!     │  ┌─────────────┐                      ┌───────────────┐   │
//!     │  │   poller    │ ── writes ──┐        │  web server   │   │
//!     │  │ (interval)  │             ▼        │  (port 3000)  │   │
//!     │  └──────┬──────┘      ┌──────────────┐└───────┬───────┘   │
//!     │         │             │ DisplayStore │◄─ reads┘           │
//!     │         │             └──────────────┘                    │
//!     └─────────┼────────────────────────────────────────────────┘
//!               │ https GET
//!               ▼
//!        remote store: /sensorLogs/device1.json
//!
//! ==============================================================================

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use waterlog_host::config::WaterlogConfig;
use waterlog_host::server::{self, AppState};
use waterlog_host::{DisplayStore, HttpSource, Poller};

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Waterlog Host - Water Quality Dashboard");
    println!("===========================================================");

    // step 1: load configuration
    let config = WaterlogConfig::load_or_default();
    config.validate().context("invalid configuration")?;
    config.print_summary();

    // step 2: logging (RUST_LOG wins over the config file)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    // step 3: shared display state
    let store = DisplayStore::new();

    // step 4: start polling. the handle owns the timer, so any early return
    // below cancels it on drop.
    let source = HttpSource::new(&config.source)?;
    let poller = Poller::new(Arc::new(source), store.clone())
        .with_max_rows(config.dashboard.max_rows)
        .with_row_logging(config.logging.show_sensor_data)
        .activate(config.polling.interval());

    // step 5: serve the dashboard until ctrl-c
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    let state = AppState {
        store,
        page_refresh_seconds: config.dashboard.page_refresh_seconds,
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested");
    };
    let served = server::run_server(listener, state, shutdown).await;

    // step 6: stop the timer whether or not the server exited cleanly
    poller.deactivate().await;
    served
}
