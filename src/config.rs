use std::time::Duration;

use crate::error::{AppError, Result};
use crate::pipeline::currency::RateTable;
use crate::pipeline::PipelineSettings;
use crate::types::NegativeDeltaPolicy;

/// Template for catalog entries that carry no link of their own.
/// `{product_id}`, `{region}` and `{locale}` are substituted verbatim.
pub const PRODUCT_LINK_TEMPLATE: &str =
    "https://shop.tiktok.com/view/product/{product_id}?region={region}&locale={locale}";

pub const DEFAULT_REGION: &str = "US";
pub const DEFAULT_LOCALE: &str = "en";

/// Trailing window for rolling sales, in seconds (24h).
pub const ROLLING_WINDOW_SECS: i64 = 24 * 3_600;

/// Symbol → rate-to-USD. Symbols are matched longest first, so the order here
/// does not matter for `S$` vs `$`.
pub const DEFAULT_CURRENCY_RATES: &[(&str, f64)] = &[
    ("RM", 0.24),
    ("S$", 0.74),
    ("$", 1.0),
    ("฿", 0.03),
    ("₫", 0.000043),
    ("₱", 0.020),
];

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Apply bundled migrations on startup (DB_MIGRATE). Leave off for an external store.
    pub db_migrate: bool,
    pub api_port: u16,
    /// How long a fetched query result may be served from cache (QUERY_CACHE_TTL_SECS).
    pub query_cache_ttl: Duration,
    /// Pipeline refresh cadence (REFRESH_INTERVAL_SECS).
    pub refresh_interval: Duration,
    pub default_region: String,
    pub default_locale: String,
    pub currency_rates: RateTable,
    pub negative_delta_policy: NegativeDeltaPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let currency_rates = match std::env::var("CURRENCY_RATES") {
            Ok(raw) => RateTable::default().with_overrides(&parse_rate_overrides(&raw)?),
            Err(_) => RateTable::default(),
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "sales.db".to_string()),
            db_migrate: std::env::var("DB_MIGRATE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(true),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            query_cache_ttl: parse_secs(
                "QUERY_CACHE_TTL_SECS",
                std::env::var("QUERY_CACHE_TTL_SECS").ok().as_deref(),
                10,
            )?,
            refresh_interval: parse_secs(
                "REFRESH_INTERVAL_SECS",
                std::env::var("REFRESH_INTERVAL_SECS").ok().as_deref(),
                60,
            )?
            .max(Duration::from_secs(1)),
            default_region: std::env::var("DEFAULT_REGION")
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            default_locale: std::env::var("DEFAULT_LOCALE")
                .unwrap_or_else(|_| DEFAULT_LOCALE.to_string()),
            currency_rates,
            negative_delta_policy: std::env::var("NEGATIVE_DELTA_POLICY")
                .unwrap_or_else(|_| "pass_through".to_string())
                .parse()?,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            rates: self.currency_rates.clone(),
            region: self.default_region.clone(),
            locale: self.default_locale.clone(),
            negative_delta_policy: self.negative_delta_policy,
        }
    }
}

/// Whole seconds from an env value; unset means `default`, anything else must parse.
pub fn parse_secs(name: &str, raw: Option<&str>, default: u64) -> Result<Duration> {
    match raw {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| AppError::Config(format!("{name} must be a whole number of seconds, got '{raw}'"))),
    }
}

/// Parse `SYMBOL=RATE` pairs separated by commas, e.g. `RM=0.22,€=1.08`.
pub fn parse_rate_overrides(raw: &str) -> Result<Vec<(String, f64)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (symbol, rate) = entry.split_once('=').ok_or_else(|| {
                AppError::Config(format!("CURRENCY_RATES entry '{entry}' is not SYMBOL=RATE"))
            })?;
            let symbol = symbol.trim();
            let rate = rate.trim().parse::<f64>().ok().filter(|r| r.is_finite() && *r >= 0.0);
            match (symbol.is_empty(), rate) {
                (false, Some(rate)) => Ok((symbol.to_string(), rate)),
                _ => Err(AppError::Config(format!(
                    "CURRENCY_RATES entry '{entry}' has an empty symbol or invalid rate"
                ))),
            }
        })
        .collect()
}
