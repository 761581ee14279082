// =============================================================================
// Aurora Market Core — Main Entry Point
// =============================================================================
//
// Brings up the durable log producer, the two independent consumer
// workers, and the read-only HTTP surface as sibling tasks
// under one process.
// =============================================================================

mod api;
mod backfill;
mod broadcast;
mod config;
mod db;
mod error;
mod ingest;
mod log;
mod market_hours;
mod query;
mod retry;
mod types;
mod validation;
mod workers;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::backfill::EodVendorClient;
use crate::broadcast::Broadcast;
use crate::config::Config;
use crate::log::LogProducer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("aurora-market-core starting up");

    let config = Config::from_env()?;
    info!(symbols = ?config.symbols, "configured symbols");

    // ── 1. Storage backends ──────────────────────────────────────────────
    let pool = db::connect(&config.database_url()).await?;
    db::ensure_schema(&pool).await?;
    let broadcast = Broadcast::new(&config.redis_url(), config.redis_stream_maxlen)?;
    let vendor = Arc::new(EodVendorClient::new(
        &config.eod_vendor_api_key,
        &config.eod_vendor_base_url,
    )?);

    // ── 2. Durable log producer, used by the ingest task ─────────────────
    let producer = LogProducer::new(&config.kafka_bootstrap_servers)?;

    // ── 3. Ingest task ───────────────────────────────────────────────
    {
        let ws_url = config.alpaca_base_url.clone();
        let api_key = config.alpaca_api_key.clone();
        let api_secret = config.alpaca_secret_key.clone();
        let symbols = config.symbols.clone();
        tokio::spawn(async move {
            ingest::run_feed_forever(&ws_url, &api_key, &api_secret, &symbols, &producer).await;
        });
    }
    info!("ingest task launched");

    // ── 4. Persistence worker ────────────────────────────────────────
    {
        let bootstrap = config.kafka_bootstrap_servers.clone();
        let pool = pool.clone();
        tokio::spawn(async move {
            if let Err(e) = workers::persistence::run(&bootstrap, pool).await {
                error!(error = %e, "persistence worker exited");
            }
        });
    }

    // ── 5. Broadcast fan-out worker ─────────────────────────────────
    {
        let bootstrap = config.kafka_bootstrap_servers.clone();
        let broadcast = broadcast.clone();
        tokio::spawn(async move {
            if let Err(e) = workers::fanout::run(&bootstrap, broadcast).await {
                error!(error = %e, "fan-out worker exited");
            }
        });
    }

    info!("background workers launched");

    // ── 6. HTTP surface ───────────────────────────────────────────────
    let state = AppState {
        pool,
        broadcast,
        vendor,
    };
    let app = api::router(state, &config.allowed_origins);
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    info!(addr = %config.http_bind_addr, "HTTP server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
