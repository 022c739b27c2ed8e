//! Shares-outstanding observations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Composite store key. At most one observation exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareKey {
    pub date: NaiveDate,
    pub symbol: String,
}

impl ShareKey {
    pub fn new(date: NaiveDate, symbol: impl Into<String>) -> Self {
        Self {
            date,
            symbol: symbol.into(),
        }
    }
}

/// One dated shares-outstanding value for one fund, as persisted in the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharesObservation {
    pub date: NaiveDate,
    pub symbol: String,
    pub shares_outstanding: u64,
}

impl SharesObservation {
    pub fn key(&self) -> ShareKey {
        ShareKey::new(self.date, self.symbol.clone())
    }

    pub fn point(&self) -> SharesPoint {
        SharesPoint {
            date: self.date,
            shares: self.shares_outstanding,
        }
    }
}

/// A single point of one symbol's shares series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SharesPoint {
    pub date: NaiveDate,
    pub shares: u64,
}

impl SharesPoint {
    pub fn new(date: NaiveDate, shares: u64) -> Self {
        Self { date, shares }
    }
}

/// Parsed header of a fund-provider holdings export.
///
/// `as_of` is the date the provider says the snapshot represents, which may
/// differ from the date that was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharesSnapshot {
    pub as_of: NaiveDate,
    pub shares_outstanding: u64,
}

impl SharesSnapshot {
    pub fn into_observation(self, symbol: impl Into<String>) -> SharesObservation {
        SharesObservation {
            date: self.as_of,
            symbol: symbol.into(),
            shares_outstanding: self.shares_outstanding,
        }
    }
}
