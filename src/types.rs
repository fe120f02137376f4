use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One observation of a product's cumulative sales counter and listed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSnapshot {
    pub product_link: String,
    pub observed_at: DateTime<Utc>,
    pub cumulative_sales: f64,
    /// Vendor free text, e.g. `$12.50-$15.00`, `RM30`, or empty.
    pub price_text: String,
}

/// A tracked product. The catalog decides which products appear in the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: String,
    pub product_name: String,
    pub first_category: String,
    pub picture_url: String,
    /// None when the catalog has no link yet; one is synthesized from `product_id`.
    pub product_link: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived
// ---------------------------------------------------------------------------

/// A snapshot with its per-product derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSnapshot {
    pub snapshot: SalesSnapshot,
    /// Sales since the previous snapshot of the same product (0 for the first).
    pub sales_delta: f64,
    /// Sum of `sales_delta` over `[observed_at - 24h, observed_at]`.
    pub rolling_24h_sales: f64,
    /// None when `price_text` could not be parsed.
    pub lowest_price_usd: Option<f64>,
}

impl AnnotatedSnapshot {
    /// Unknown price propagates: never reported as zero GMV.
    pub fn rolling_24h_gmv(&self) -> Option<f64> {
        self.lowest_price_usd.map(|p| p * self.rolling_24h_sales)
    }
}

/// A decrease of the cumulative counter between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegativeDelta {
    pub product_link: String,
    pub observed_at: DateTime<Utc>,
    /// Raw counter difference, before any policy was applied.
    pub sales_delta: f64,
}

/// What the growth step does with a counter that went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeDeltaPolicy {
    /// Keep the negative delta as computed.
    #[default]
    PassThrough,
    /// Report 0 for the decrease; the lowered value is the new baseline.
    ClampZero,
    /// Measure deltas against the running maximum; a dip and its recovery net to 0.
    HighWaterMark,
}

impl std::fmt::Display for NegativeDeltaPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NegativeDeltaPolicy::PassThrough => "pass_through",
            NegativeDeltaPolicy::ClampZero => "clamp_zero",
            NegativeDeltaPolicy::HighWaterMark => "high_water_mark",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NegativeDeltaPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass_through" => Ok(NegativeDeltaPolicy::PassThrough),
            "clamp_zero" => Ok(NegativeDeltaPolicy::ClampZero),
            "high_water_mark" => Ok(NegativeDeltaPolicy::HighWaterMark),
            other => Err(AppError::Config(format!(
                "NEGATIVE_DELTA_POLICY must be pass_through, clamp_zero or high_water_mark, got '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One row per catalog product: its most recent snapshot joined with catalog metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedProductRow {
    pub product_id: String,
    pub product_name: String,
    pub first_category: String,
    pub picture_url: String,
    pub product_link: String,
    pub country: String,
    /// Empty when the product has no sales history.
    pub price_text: String,
    pub observed_at: Option<DateTime<Utc>>,
    pub cumulative_sales: Option<f64>,
    /// Delta of the latest snapshot against the one before it.
    pub sales_growth: Option<f64>,
    pub rolling_24h_sales: f64,
    pub lowest_price_usd: Option<f64>,
    pub rolling_24h_gmv: Option<f64>,
}

/// The display columns of a merged row. Unknown values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub picture_url: String,
    pub first_category: String,
    pub product_name: String,
    pub rolling_24h_sales: f64,
    pub rolling_24h_gmv: Option<f64>,
    pub price_text: String,
    pub product_link: String,
    pub country: String,
}

impl MergedProductRow {
    pub fn record(&self) -> ProductRecord {
        ProductRecord {
            picture_url: self.picture_url.clone(),
            first_category: self.first_category.clone(),
            product_name: self.product_name.clone(),
            rolling_24h_sales: self.rolling_24h_sales,
            rolling_24h_gmv: self.rolling_24h_gmv,
            price_text: self.price_text.clone(),
            product_link: self.product_link.clone(),
            country: self.country.clone(),
        }
    }

    /// Uniform row-of-maps export for consumers that don't know the struct.
    pub fn to_record(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self.record()) {
            Ok(serde_json::Value::Object(map)) => map,
            // ProductRecord is a plain struct; serde_json turns non-finite floats into null.
            _ => serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_round_trips_through_display() {
        for policy in [
            NegativeDeltaPolicy::PassThrough,
            NegativeDeltaPolicy::ClampZero,
            NegativeDeltaPolicy::HighWaterMark,
        ] {
            assert_eq!(policy.to_string().parse::<NegativeDeltaPolicy>().unwrap(), policy);
        }
        assert!("rebase".parse::<NegativeDeltaPolicy>().is_err());
    }

    #[test]
    fn record_has_uniform_columns_and_null_for_unknown() {
        let row = MergedProductRow {
            product_id: "1".to_string(),
            product_name: "Mug".to_string(),
            first_category: "Home".to_string(),
            picture_url: "https://img/1.png".to_string(),
            product_link: "https://shop/1?region=MY".to_string(),
            country: "MY".to_string(),
            price_text: "oops".to_string(),
            observed_at: None,
            cumulative_sales: None,
            sales_growth: None,
            rolling_24h_sales: 12.0,
            lowest_price_usd: None,
            rolling_24h_gmv: None,
        };
        let record = row.to_record();
        let mut keys: Vec<&str> = record.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "country",
                "first_category",
                "picture_url",
                "price_text",
                "product_link",
                "product_name",
                "rolling_24h_gmv",
                "rolling_24h_sales",
            ]
        );
        assert!(record["rolling_24h_gmv"].is_null());
        assert_eq!(record["rolling_24h_sales"], serde_json::json!(12.0));
    }
}
