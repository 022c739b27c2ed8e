//! Flow derivation.
//!
//! `daily_flow[i] = (shares[i] - shares[i-1]) * close[i]`, undefined on the
//! first row. Rolling sums and the cumulative total are computed over the
//! full merged history; trimming to the reporting window happens afterwards
//! so the sums at the start of the window already see their full lookback.

use super::rolling::{cumulative_sum, rolling_sum};
use crate::domain::{FlowRecord, FlowSummary, MergedSeries};
use chrono::{Duration, NaiveDate};

/// Default reporting window in calendar days (about two years).
pub const DEFAULT_WINDOW_DAYS: i64 = 730;

/// The trailing aggregation windows, measured in trading rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowWindow {
    Weekly,
    Monthly,
    ThreeMonth,
    SixMonth,
}

impl FlowWindow {
    pub const ALL: [FlowWindow; 4] = [
        FlowWindow::Weekly,
        FlowWindow::Monthly,
        FlowWindow::ThreeMonth,
        FlowWindow::SixMonth,
    ];

    /// Window length in trading rows.
    pub fn rows(self) -> usize {
        match self {
            FlowWindow::Weekly => 5,
            FlowWindow::Monthly => 21,
            FlowWindow::ThreeMonth => 63,
            FlowWindow::SixMonth => 126,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FlowWindow::Weekly => "weekly",
            FlowWindow::Monthly => "monthly",
            FlowWindow::ThreeMonth => "three_month",
            FlowWindow::SixMonth => "six_month",
        }
    }
}

/// Derive flow records for every row that has a defined daily flow.
pub fn derive(merged: &MergedSeries) -> Vec<FlowRecord> {
    let rows = merged.rows();
    if rows.len() < 2 {
        return Vec::new();
    }

    let changes: Vec<Option<i64>> = std::iter::once(None)
        .chain(rows.windows(2).map(|w| Some(shares_delta(w[0].shares, w[1].shares))))
        .collect();

    let daily: Vec<Option<f64>> = changes
        .iter()
        .zip(rows)
        .map(|(change, row)| change.map(|c| c as f64 * row.close))
        .collect();

    let weekly = rolling_sum(&daily, FlowWindow::Weekly.rows());
    let monthly = rolling_sum(&daily, FlowWindow::Monthly.rows());
    let three_month = rolling_sum(&daily, FlowWindow::ThreeMonth.rows());
    let six_month = rolling_sum(&daily, FlowWindow::SixMonth.rows());
    let cumulative = cumulative_sum(&daily);

    let mut records = Vec::with_capacity(rows.len() - 1);
    for (i, row) in rows.iter().enumerate() {
        let (Some(shares_change), Some(daily_flow)) = (changes[i], daily[i]) else {
            continue;
        };
        records.push(FlowRecord {
            date: row.date,
            close: row.close,
            shares: row.shares,
            shares_change,
            daily_flow,
            weekly_flow: weekly[i].unwrap_or(0.0),
            monthly_flow: monthly[i].unwrap_or(0.0),
            three_month_flow: three_month[i].unwrap_or(0.0),
            six_month_flow: six_month[i].unwrap_or(0.0),
            cumulative_flow: cumulative[i],
        });
    }
    records
}

/// Latest values of the derived series; all zero when there are no records.
pub fn summarize(records: &[FlowRecord]) -> FlowSummary {
    records
        .last()
        .map(|r| FlowSummary {
            daily: r.daily_flow,
            weekly: r.weekly_flow,
            monthly: r.monthly_flow,
            three_month: r.three_month_flow,
            six_month: r.six_month_flow,
        })
        .unwrap_or_default()
}

/// Records dated within the trailing `window_days` ending at `as_of`.
///
/// A record is kept when `date > as_of - window_days`. `records` must be
/// date-ordered, as returned by [`derive`].
pub fn window_records(records: &[FlowRecord], as_of: NaiveDate, window_days: i64) -> &[FlowRecord] {
    let cutoff = as_of - Duration::days(window_days);
    let start = records.partition_point(|r| r.date <= cutoff);
    &records[start..]
}

fn shares_delta(previous: u64, current: u64) -> i64 {
    let delta = i128::from(current) - i128::from(previous);
    i64::try_from(delta).unwrap_or(if delta > 0 { i64::MAX } else { i64::MIN })
}
