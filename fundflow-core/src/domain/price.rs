//! Daily price bars from the market-data provider.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar, already normalized to a timezone-naive trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// The (date, close) pair the flow pipeline consumes.
    pub fn observation(&self) -> PriceObservation {
        PriceObservation {
            date: self.date,
            close: self.close,
        }
    }
}

/// Closing price on one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}
