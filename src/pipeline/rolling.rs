use chrono::{DateTime, Duration, Utc};

use crate::config::ROLLING_WINDOW_SECS;
use crate::pipeline::growth::GrowthRecord;

pub fn rolling_window() -> Duration {
    Duration::seconds(ROLLING_WINDOW_SECS)
}

/// Running sum with Neumaier compensation, so adding and later removing the
/// same fractional deltas does not leave rounding residue behind.
#[derive(Debug, Default, Clone, Copy)]
struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Trailing time-window sums of `sales_delta`, one per record.
///
/// `records` must be sorted by `observed_at` (as `compute_growth` returns them).
/// The window for record `i` is `[t_i - window, t_i]`, inclusive at both ends,
/// so later records sharing `t_i` are counted too. Two monotonic pointers keep
/// this linear in the number of records. When every earlier record has left
/// the window the sum restarts from the records just added.
pub fn rolling_sums(records: &[GrowthRecord], window: Duration) -> Vec<f64> {
    let times: Vec<DateTime<Utc>> = records.iter().map(|r| r.snapshot.observed_at).collect();
    debug_assert!(times.windows(2).all(|w| w[0] <= w[1]), "records must be time-ordered");

    let mut sums = Vec::with_capacity(records.len());
    let mut start = 0usize;
    let mut end = 0usize;
    let mut sum = CompensatedSum::default();

    for &t in &times {
        let added_from = end;
        while end < records.len() && times[end] <= t {
            sum.add(records[end].sales_delta);
            end += 1;
        }
        while t - times[start] > window {
            sum.add(-records[start].sales_delta);
            start += 1;
        }
        if start >= added_from {
            sum = CompensatedSum::default();
            for record in &records[start..end] {
                sum.add(record.sales_delta);
            }
        }
        sums.push(sum.value());
    }

    sums
}

pub fn rolling_24h_sales(records: &[GrowthRecord]) -> Vec<f64> {
    rolling_sums(records, rolling_window())
}
