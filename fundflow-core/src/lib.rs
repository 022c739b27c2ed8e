//! Fundflow Core: shares history, series reconciliation and flow derivation.
//!
//! This crate contains the heart of the fund flow pipeline:
//! - Domain types (shares observations, price bars, merged rows, flow records)
//! - Shares history store keyed by (date, symbol) with atomic whole-table saves
//! - Series merge: forward-fill the sparse shares series onto trading days
//! - Flow derivation: daily flow, trailing rolling sums, cumulative total
//! - Date-integrity guard for provider snapshots
//! - Provider traits plus the Yahoo and iShares HTTP implementations
//! - Parquet price cache and ticker configuration

pub mod data;
pub mod domain;
pub mod reconcile;
pub mod series;
pub mod store;
pub mod tickers;

pub use domain::{
    FlowRecord, FlowSummary, MergedRow, MergedSeries, PriceBar, PriceObservation, ShareKey,
    SharesObservation, SharesPoint, SharesSnapshot,
};
pub use reconcile::{reconcile, Reconciled};
pub use series::{derive, merge, rolling_sum, summarize, window_records, FlowWindow};
pub use store::{SharesHistory, StoreError, UpsertOutcome};
pub use tickers::{ConfigError, TickerConfig, TickerList};
