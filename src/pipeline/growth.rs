use crate::types::{NegativeDeltaPolicy, SalesSnapshot};

/// A snapshot paired with the sales it added since the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRecord {
    pub snapshot: SalesSnapshot,
    /// Delta after the negative-delta policy was applied.
    pub sales_delta: f64,
    /// Plain counter difference to the previous snapshot.
    pub raw_delta: f64,
}

/// Per-snapshot sales deltas for one product's history.
///
/// Records are ordered by `observed_at` with a stable sort, so snapshots sharing
/// a timestamp keep their input order. The first record's delta is 0.
pub fn compute_growth(group: &[SalesSnapshot], policy: NegativeDeltaPolicy) -> Vec<GrowthRecord> {
    let mut ordered: Vec<&SalesSnapshot> = group.iter().collect();
    ordered.sort_by_key(|s| s.observed_at);

    let mut records = Vec::with_capacity(ordered.len());
    let mut previous: Option<f64> = None;
    let mut high_water = f64::NEG_INFINITY;

    for snapshot in ordered {
        let current = snapshot.cumulative_sales;
        let raw_delta = previous.map_or(0.0, |p| current - p);

        let sales_delta = match policy {
            NegativeDeltaPolicy::PassThrough => raw_delta,
            NegativeDeltaPolicy::ClampZero => raw_delta.max(0.0),
            NegativeDeltaPolicy::HighWaterMark => {
                if previous.is_none() {
                    0.0
                } else {
                    (current - high_water).max(0.0)
                }
            }
        };

        high_water = high_water.max(current);
        previous = Some(current);
        records.push(GrowthRecord {
            snapshot: snapshot.clone(),
            sales_delta,
            raw_delta,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn snap(hours: i64, sales: f64) -> SalesSnapshot {
        SalesSnapshot {
            product_link: "p1".to_string(),
            observed_at: t0() + Duration::hours(hours),
            cumulative_sales: sales,
            price_text: "$1".to_string(),
        }
    }

    fn deltas(records: &[GrowthRecord]) -> Vec<f64> {
        records.iter().map(|r| r.sales_delta).collect()
    }

    #[test]
    fn deltas_pass_negative_through() {
        let group = vec![snap(0, 100.0), snap(1, 150.0), snap(2, 140.0), snap(3, 200.0)];
        let records = compute_growth(&group, NegativeDeltaPolicy::PassThrough);
        assert_eq!(deltas(&records), vec![0.0, 50.0, -10.0, 60.0]);
    }

    #[test]
    fn unsorted_input_is_ordered_by_time() {
        let group = vec![snap(3, 200.0), snap(0, 100.0), snap(2, 140.0), snap(1, 150.0)];
        let records = compute_growth(&group, NegativeDeltaPolicy::PassThrough);
        assert_eq!(deltas(&records), vec![0.0, 50.0, -10.0, 60.0]);
        assert_eq!(records[0].snapshot.observed_at, t0());
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let group = vec![snap(0, 10.0), snap(1, 30.0), snap(1, 20.0)];
        let records = compute_growth(&group, NegativeDeltaPolicy::PassThrough);
        assert_eq!(deltas(&records), vec![0.0, 20.0, -10.0]);
    }

    #[test]
    fn single_snapshot_has_zero_delta() {
        let records = compute_growth(&[snap(0, 42.0)], NegativeDeltaPolicy::PassThrough);
        assert_eq!(deltas(&records), vec![0.0]);
    }

    #[test]
    fn empty_group_yields_nothing() {
        assert!(compute_growth(&[], NegativeDeltaPolicy::PassThrough).is_empty());
    }

    #[test]
    fn clamp_zero_rebaselines_on_the_lower_value() {
        let group = vec![snap(0, 100.0), snap(1, 90.0), snap(2, 110.0)];
        let records = compute_growth(&group, NegativeDeltaPolicy::ClampZero);
        assert_eq!(deltas(&records), vec![0.0, 0.0, 20.0]);
        assert_eq!(records[1].raw_delta, -10.0);
    }

    #[test]
    fn high_water_mark_nets_dip_and_recovery() {
        let group = vec![snap(0, 100.0), snap(1, 90.0), snap(2, 95.0), snap(3, 110.0)];
        let records = compute_growth(&group, NegativeDeltaPolicy::HighWaterMark);
        assert_eq!(deltas(&records), vec![0.0, 0.0, 0.0, 10.0]);
    }
}
