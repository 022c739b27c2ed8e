//! Merged series and derived flow records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One trading day after shares have been forward-filled onto the price index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub date: NaiveDate,
    pub close: f64,
    pub shares: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("rows out of order: {previous} is not before {next}")]
    OutOfOrder { previous: NaiveDate, next: NaiveDate },
}

/// Date-ordered merged series.
///
/// Dates are strictly ascending: no duplicates, and (when built by
/// [`crate::series::merge`]) no row before the first known shares value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSeries {
    rows: Vec<MergedRow>,
}

impl MergedSeries {
    /// Build a series from rows, rejecting any that are not strictly ascending by date.
    pub fn from_rows(rows: Vec<MergedRow>) -> Result<Self, SeriesError> {
        if let Some(w) = rows.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(SeriesError::OutOfOrder {
                previous: w[0].date,
                next: w[1].date,
            });
        }
        Ok(Self { rows })
    }

    pub(crate) fn from_sorted(rows: Vec<MergedRow>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
        Self { rows }
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&MergedRow> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&MergedRow> {
        self.rows.last()
    }

    pub fn into_rows(self) -> Vec<MergedRow> {
        self.rows
    }
}

/// Derived flows for one trading day.
///
/// Only rows with a defined daily flow exist, so the first merged row never
/// appears as a `FlowRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub shares: u64,
    pub shares_change: i64,
    pub daily_flow: f64,
    pub weekly_flow: f64,
    pub monthly_flow: f64,
    pub three_month_flow: f64,
    pub six_month_flow: f64,
    pub cumulative_flow: f64,
}

/// Latest-value indicators. Zero when there is no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub three_month: f64,
    pub six_month: f64,
}
