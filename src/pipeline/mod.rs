//! Snapshot history + catalog → one display row per product.
//!
//! Pure and synchronous: every stage takes its input by reference and returns
//! new values, so the same input always produces the same table.

pub mod currency;
pub mod growth;
pub mod merge;
pub mod rolling;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{AnnotatedSnapshot, CatalogEntry, MergedProductRow, NegativeDelta, NegativeDeltaPolicy, SalesSnapshot};
use currency::{normalize, RateTable};
use growth::compute_growth;
use merge::merge_latest;
use rolling::rolling_24h_sales;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub rates: RateTable,
    /// Region used for synthesized links and as the fallback country.
    pub region: String,
    pub locale: String,
    pub negative_delta_policy: NegativeDeltaPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rates: RateTable::default(),
            region: crate::config::DEFAULT_REGION.to_string(),
            locale: crate::config::DEFAULT_LOCALE.to_string(),
            negative_delta_policy: NegativeDeltaPolicy::default(),
        }
    }
}

/// Data-quality summary of one run. Row anomalies end up here, never as errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub snapshot_count: usize,
    pub product_count: usize,
    /// The snapshot input was empty.
    pub no_data: bool,
    /// Snapshots whose price text could not be normalized.
    pub unknown_prices: usize,
    pub negative_deltas: Vec<NegativeDelta>,
    /// Sales-history links with no catalog entry.
    pub orphan_links: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    pub rows: Vec<MergedProductRow>,
    pub report: PipelineReport,
}

/// Growth and rolling metrics for one product's snapshots. Counter decreases
/// are appended to `negative_deltas` with their raw value, whatever the policy.
pub fn annotate_group(
    group: &[SalesSnapshot],
    settings: &PipelineSettings,
    negative_deltas: &mut Vec<NegativeDelta>,
) -> Vec<AnnotatedSnapshot> {
    let growth = compute_growth(group, settings.negative_delta_policy);
    let rolling = rolling_24h_sales(&growth);

    growth
        .into_iter()
        .zip(rolling)
        .map(|(record, rolling_24h_sales)| {
            if record.raw_delta < 0.0 {
                negative_deltas.push(NegativeDelta {
                    product_link: record.snapshot.product_link.clone(),
                    observed_at: record.snapshot.observed_at,
                    sales_delta: record.raw_delta,
                });
            }
            AnnotatedSnapshot {
                lowest_price_usd: normalize(&record.snapshot.price_text, &settings.rates),
                sales_delta: record.sales_delta,
                rolling_24h_sales,
                snapshot: record.snapshot,
            }
        })
        .collect()
}

/// Run the full transform over one fetched snapshot set.
pub fn run_pipeline(
    snapshots: &[SalesSnapshot],
    catalog: &[CatalogEntry],
    settings: &PipelineSettings,
) -> PipelineOutput {
    // BTreeMap keeps group iteration order independent of hashing.
    let mut groups: BTreeMap<&str, Vec<SalesSnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        groups
            .entry(snapshot.product_link.as_str())
            .or_default()
            .push(snapshot.clone());
    }

    let mut report = PipelineReport {
        snapshot_count: snapshots.len(),
        no_data: snapshots.is_empty(),
        ..PipelineReport::default()
    };

    let mut history = Vec::with_capacity(snapshots.len());
    for group in groups.values() {
        history.extend(annotate_group(group, settings, &mut report.negative_deltas));
    }

    report.unknown_prices = history.iter().filter(|a| a.lowest_price_usd.is_none()).count();

    let merged = merge_latest(&history, catalog, &settings.region, &settings.locale);
    report.product_count = merged.rows.len();
    report.orphan_links = merged.orphan_links;

    PipelineOutput {
        rows: merged.rows,
        report,
    }
}
