use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::RefreshTimings;
use crate::error::Result;
use crate::pipeline::{run_pipeline, PipelineReport, PipelineSettings};
use crate::source::{CachedSource, SnapshotSource};
use crate::state::TableStore;

/// Re-runs the pipeline on a fixed cadence and publishes the merged table.
/// A failed fetch keeps the previously published table in place.
pub struct Refresher<S> {
    source: Arc<CachedSource<S>>,
    settings: PipelineSettings,
    every: Duration,
    table: Arc<TableStore>,
    health: Arc<HealthState>,
    timings: Arc<RefreshTimings>,
}

impl<S: SnapshotSource> Refresher<S> {
    pub fn new(
        source: Arc<CachedSource<S>>,
        settings: PipelineSettings,
        every: Duration,
        table: Arc<TableStore>,
        health: Arc<HealthState>,
        timings: Arc<RefreshTimings>,
    ) -> Self {
        Self { source, settings, every, table, health, timings }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.every);
        ticker.tick().await; // bootstrap already ran; skip the immediate first tick

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh_once().await {
                error!("Refresh failed, keeping previous table: {e}");
            }
        }
    }

    /// Fetch both inputs, run the pipeline and publish the result.
    pub async fn refresh_once(&self) -> Result<PipelineReport> {
        let started = Instant::now();

        let fetched = tokio::try_join!(self.source.snapshots(), self.source.catalog());
        let (snapshots, catalog) = match fetched {
            Ok(inputs) => inputs,
            Err(e) => {
                self.health.record_failure();
                return Err(e);
            }
        };

        let output = run_pipeline(&snapshots, &catalog, &self.settings);
        let report = output.report.clone();
        let computed_at = Utc::now();
        self.table.publish(output, computed_at);

        let elapsed = started.elapsed();
        self.timings.record(elapsed);
        self.health.record_success(computed_at.timestamp_millis());
        log_report(&report, elapsed);

        Ok(report)
    }
}

fn log_report(report: &PipelineReport, elapsed: Duration) {
    if report.no_data {
        warn!(
            event = "NO_DATA",
            catalog_products = report.product_count,
            "Snapshot query returned no rows; publishing catalog with empty metrics"
        );
    }

    for nd in &report.negative_deltas {
        warn!(
            event = "NEGATIVE_DELTA",
            product_link = %nd.product_link,
            observed_at = %nd.observed_at,
            sales_delta = nd.sales_delta,
            "Cumulative sales went down"
        );
    }

    if !report.orphan_links.is_empty() {
        info!(
            orphans = report.orphan_links.len(),
            "Dropped sales history for links missing from the catalog"
        );
    }

    info!(
        event = "REFRESH",
        products = report.product_count,
        snapshots = report.snapshot_count,
        unknown_prices = report.unknown_prices,
        negative_deltas = report.negative_deltas.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "REFRESH | products: {} | snapshots: {} | unknown prices: {} | negative deltas: {}",
        report.product_count,
        report.snapshot_count,
        report.unknown_prices,
        report.negative_deltas.len(),
    );
}
