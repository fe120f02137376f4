mod api;
mod config;
mod db;
mod error;
mod pipeline;
mod refresher;
mod source;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::RefreshTimings;
use crate::api::{router, ApiState};
use crate::config::Config;
use crate::db::SqliteSnapshotStore;
use crate::error::Result;
use crate::refresher::Refresher;
use crate::source::CachedSource;
use crate::state::TableStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Snapshot store ---
    let store = SqliteSnapshotStore::connect(&cfg.db_path).await?;
    if cfg.db_migrate {
        store.migrate().await?;
        info!("Snapshot store schema ready at {}", cfg.db_path);
    }

    info!(
        region = %cfg.default_region,
        locale = %cfg.default_locale,
        policy = %cfg.negative_delta_policy,
        currencies = ?cfg.currency_rates.symbols().collect::<Vec<_>>(),
        cache_ttl_s = cfg.query_cache_ttl.as_secs(),
        refresh_s = cfg.refresh_interval.as_secs(),
        "Pipeline configured"
    );

    let source = Arc::new(CachedSource::new(store, cfg.query_cache_ttl));
    let table = TableStore::new();
    let health = Arc::new(HealthState::new());
    let timings = Arc::new(RefreshTimings::new());

    let refresher = Refresher::new(
        source,
        cfg.pipeline_settings(),
        cfg.refresh_interval,
        Arc::clone(&table),
        Arc::clone(&health),
        Arc::clone(&timings),
    );

    // --- Bootstrap: first table before the API comes up ---
    match refresher.refresh_once().await {
        Ok(report) => info!(
            "Bootstrap complete: {} products from {} snapshots",
            report.product_count, report.snapshot_count
        ),
        Err(e) => warn!("Bootstrap refresh failed, serving no data until the next refresh: {e}"),
    }

    tokio::spawn(async move { refresher.run().await });

    // --- HTTP API ---
    let app = router(ApiState { table, health, timings });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
