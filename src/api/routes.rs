use std::cmp::Ordering;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{RefreshTimings, TimingSummary};
use crate::error::AppError;
use crate::pipeline::PipelineReport;
use crate::state::{PublishedTable, TableStore};
use crate::types::MergedProductRow;

#[derive(Clone)]
pub struct ApiState {
    pub table: Arc<TableStore>,
    pub health: Arc<HealthState>,
    pub timings: Arc<RefreshTimings>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/products", get(get_products))
        .route("/countries", get(get_countries))
        .route("/health", get(get_health))
        .route("/stats/report", get(get_report))
        .route("/stats/latency", get(get_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// 24h GMV, highest first; unknown GMV last.
    #[default]
    Gmv,
    /// 24h sales, highest first.
    Sales,
    /// Product name, A→Z.
    Name,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    /// Comma-separated country codes, e.g. `US,MY`. Absent = all countries.
    pub country: Option<String>,
    pub sort: Option<SortKey>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub refreshes: u64,
    pub failed_refreshes: u64,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub rows: usize,
    pub no_data: bool,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub computed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: PipelineReport,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn latest_non_empty(state: &ApiState) -> Result<Arc<PublishedTable>, AppError> {
    match state.table.latest() {
        Some(table) if !table.is_empty() => Ok(table),
        Some(_) => Err(AppError::NoData("the merged product table is empty".to_string())),
        None => Err(AppError::NoData("no refresh has completed yet".to_string())),
    }
}

async fn get_products(
    State(state): State<ApiState>,
    Query(params): Query<ProductsQuery>,
) -> Result<Json<Vec<serde_json::Map<String, serde_json::Value>>>, AppError> {
    let table = latest_non_empty(&state)?;
    let rows = select_rows(&table.output.rows, &params);
    Ok(Json(rows.into_iter().map(MergedProductRow::to_record).collect()))
}

async fn get_countries(State(state): State<ApiState>) -> Result<Json<Vec<String>>, AppError> {
    let table = latest_non_empty(&state)?;
    Ok(Json(table.countries()))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let table = state.table.latest();
    Json(HealthResponse {
        status: state.health.status(),
        refreshes: state.health.refreshes(),
        failed_refreshes: state.health.failed_refreshes(),
        last_refresh_at: state
            .health
            .last_success_at_ms()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        rows: table.as_ref().map_or(0, |t| t.output.rows.len()),
        no_data: table.as_ref().map_or(true, |t| t.output.report.no_data || t.is_empty()),
    })
}

async fn get_report(State(state): State<ApiState>) -> Result<Json<ReportResponse>, AppError> {
    let table = state
        .table
        .latest()
        .ok_or_else(|| AppError::NoData("no refresh has completed yet".to_string()))?;
    Ok(Json(ReportResponse {
        computed_at: table.computed_at,
        report: table.output.report.clone(),
    }))
}

async fn get_latency(State(state): State<ApiState>) -> Json<TimingSummary> {
    Json(state.timings.summary())
}

// ---------------------------------------------------------------------------
// Filtering / ordering (presentation concerns, kept out of the pipeline)
// ---------------------------------------------------------------------------

/// Country filter, ordering and limit over the merged rows.
pub fn select_rows<'a>(rows: &'a [MergedProductRow], params: &ProductsQuery) -> Vec<&'a MergedProductRow> {
    let countries: Option<Vec<String>> = params.country.as_ref().map(|c| {
        c.split(',')
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    });

    let mut selected: Vec<&MergedProductRow> = rows
        .iter()
        .filter(|r| {
            countries.as_ref().map_or(true, |cs| {
                cs.is_empty() || cs.iter().any(|c| c.eq_ignore_ascii_case(&r.country))
            })
        })
        .collect();

    let sort = params.sort.unwrap_or_default();
    selected.sort_by(|a, b| {
        let primary = match sort {
            SortKey::Gmv => cmp_desc_unknown_last(a.rolling_24h_gmv, b.rolling_24h_gmv),
            SortKey::Sales => b.rolling_24h_sales.total_cmp(&a.rolling_24h_sales),
            SortKey::Name => a.product_name.cmp(&b.product_name),
        };
        primary.then_with(|| a.product_link.cmp(&b.product_link))
    });

    if let Some(limit) = params.limit {
        selected.truncate(limit);
    }
    selected
}

fn cmp_desc_unknown_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
