//! Row types for the snapshot store tables, decoded with `sqlx::FromRow`.
//! Numeric, timestamp and id columns are read as text and parsed here:
//! ingestion does not guarantee their storage type, and one bad cell must
//! only cost its own row.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::types::{CatalogEntry, SalesSnapshot};

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub product_link: Option<String>,
    pub create_at: Option<String>,
    pub sales: Option<String>,
    pub price: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CatalogRow {
    pub pid: Option<String>,
    pub product_name: Option<String>,
    pub first_category: Option<String>,
    pub picture: Option<String>,
    pub product_link: Option<String>,
}

impl SnapshotRow {
    /// None for rows that cannot take part in the pipeline (no link, time or count).
    pub fn into_snapshot(self) -> Option<SalesSnapshot> {
        let product_link = self.product_link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        let Some(product_link) = product_link else {
            debug!(row_id = self.id, "Skipping snapshot row without product_link");
            return None;
        };
        let Some(observed_at) = self.create_at.as_deref().and_then(parse_timestamp) else {
            debug!(row_id = self.id, product_link = %product_link, create_at = ?self.create_at, "Skipping snapshot row with missing or unparseable create_at");
            return None;
        };
        let cumulative_sales = self
            .sales
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite());
        let Some(cumulative_sales) = cumulative_sales else {
            debug!(row_id = self.id, product_link = %product_link, sales = ?self.sales, "Skipping snapshot row with non-numeric sales");
            return None;
        };

        Some(SalesSnapshot {
            product_link,
            observed_at,
            cumulative_sales,
            price_text: self.price.unwrap_or_default(),
        })
    }
}

/// RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS[.fff]` (space or `T`) read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl CatalogRow {
    pub fn into_entry(self) -> Option<CatalogEntry> {
        let product_id = self.pid.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        let Some(product_id) = product_id else {
            debug!(product_link = ?self.product_link, "Skipping catalog row without pid");
            return None;
        };

        Some(CatalogEntry {
            product_id,
            product_name: self.product_name.unwrap_or_default(),
            first_category: self.first_category.unwrap_or_default(),
            picture_url: self.picture.unwrap_or_default(),
            product_link: self.product_link.filter(|l| !l.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(link: Option<&str>, sales: Option<&str>) -> SnapshotRow {
        SnapshotRow {
            id: 1,
            product_link: link.map(str::to_string),
            create_at: Some("2024-01-01 00:00:00".to_string()),
            sales: sales.map(str::to_string),
            price: None,
        }
    }

    #[test]
    fn snapshot_row_parses_numeric_text() {
        let s = row(Some("https://p/1"), Some(" 1200 ")).into_snapshot().unwrap();
        assert_eq!(s.cumulative_sales, 1200.0);
        assert_eq!(s.price_text, "");
    }

    #[test]
    fn snapshot_row_rejects_missing_link_or_bad_sales() {
        assert!(row(None, Some("1")).into_snapshot().is_none());
        assert!(row(Some("   "), Some("1")).into_snapshot().is_none());
        assert!(row(Some("https://p/1"), Some("1.2k")).into_snapshot().is_none());
        assert!(row(Some("https://p/1"), None).into_snapshot().is_none());
    }

    #[test]
    fn timestamps_parse_as_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-02-01T09:30:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-01T11:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-01 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-02-01T09:30:00 "), Some(expected));
        assert_eq!(
            parse_timestamp("2024-02-01 09:30:00.250"),
            Some(expected + chrono::Duration::milliseconds(250))
        );
    }

    #[test]
    fn snapshot_row_rejects_unparseable_create_at() {
        let mut bad = row(Some("https://p/1"), Some("1"));
        bad.create_at = Some("yesterday".to_string());
        assert!(bad.into_snapshot().is_none());

        let mut missing = row(Some("https://p/1"), Some("1"));
        missing.create_at = None;
        assert!(missing.into_snapshot().is_none());
    }

    #[test]
    fn catalog_row_blank_link_becomes_none() {
        let entry = CatalogRow {
            pid: Some("42".to_string()),
            product_name: Some("Lamp".to_string()),
            first_category: None,
            picture: None,
            product_link: Some("".to_string()),
        }
        .into_entry()
        .unwrap();
        assert_eq!(entry.product_link, None);
        assert_eq!(entry.first_category, "");
    }
}
