//! Historical backfill: one snapshot request per business day per fund.
//!
//! Only snapshots whose as-of date equals the requested date are stored.
//! Requests are paced with a fixed delay and never retried; a failed day is
//! simply picked up by the next backfill run since its key is still missing.

use chrono::NaiveDate;
use fundflow_core::data::{business_days, SharesProvider};
use fundflow_core::{reconcile, Reconciled, SharesHistory, TickerConfig, TickerList};
use serde::Serialize;
use std::time::Duration;

const PROGRESS_EVERY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Pause after every request.
    pub delay: Duration,
}

/// Per-fund counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    pub symbol: String,
    /// Business days in the requested range.
    pub planned: usize,
    pub added: usize,
    pub skipped_existing: usize,
    /// Snapshot fetched but missing its as-of date or shares figure.
    pub no_data: usize,
    pub date_mismatch: usize,
    pub request_failures: usize,
    /// Days never requested because the provider stopped accepting requests.
    pub abandoned: usize,
    /// No provider identifiers configured.
    pub unconfigured: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub tickers: Vec<BackfillStats>,
}

impl BackfillReport {
    pub fn total_added(&self) -> usize {
        self.tickers.iter().map(|t| t.added).sum()
    }
}

pub fn backfill_ticker(
    ticker: &TickerConfig,
    provider: &dyn SharesProvider,
    history: &mut SharesHistory,
    opts: &BackfillOptions,
) -> BackfillStats {
    let symbol = ticker.symbol.as_str();
    let mut stats = BackfillStats {
        symbol: symbol.to_string(),
        ..Default::default()
    };

    if ticker.ishares().is_none() {
        tracing::info!(symbol, "no shares provider identifiers, skipping");
        stats.unconfigured = true;
        return stats;
    }

    let dates = business_days(opts.start, opts.end);
    stats.planned = dates.len();
    tracing::info!(
        symbol,
        days = dates.len(),
        start = %opts.start,
        end = %opts.end,
        "backfilling shares history"
    );

    for (i, &date) in dates.iter().enumerate() {
        if history.contains(date, symbol) {
            stats.skipped_existing += 1;
            continue;
        }

        if !provider.is_available() {
            stats.abandoned = dates[i..]
                .iter()
                .filter(|d| !history.contains(**d, symbol))
                .count();
            tracing::warn!(
                symbol,
                provider = provider.name(),
                remaining = stats.abandoned,
                "provider unavailable, abandoning remaining dates"
            );
            break;
        }

        match provider.fetch_snapshot(ticker, Some(date)) {
            Ok(snapshot) => match reconcile(symbol, date, snapshot) {
                Reconciled::Accept(obs) => {
                    history.insert_observation(&obs);
                    stats.added += 1;
                    if stats.added % PROGRESS_EVERY == 0 {
                        tracing::info!(symbol, added = stats.added, at = %date, "backfill progress");
                    }
                }
                Reconciled::DateMismatch {
                    requested,
                    returned,
                } => {
                    tracing::debug!(symbol, %requested, %returned, "snapshot date mismatch, discarded");
                    stats.date_mismatch += 1;
                }
            },
            Err(e) if e.is_unparseable() => {
                tracing::debug!(symbol, %date, error = %e, "no usable snapshot");
                stats.no_data += 1;
            }
            Err(e) => {
                tracing::warn!(symbol, %date, error = %e, "snapshot request failed");
                stats.request_failures += 1;
            }
        }

        if !opts.delay.is_zero() {
            std::thread::sleep(opts.delay);
        }
    }

    tracing::info!(
        symbol,
        added = stats.added,
        existing = stats.skipped_existing,
        no_data = stats.no_data,
        date_mismatch = stats.date_mismatch,
        failures = stats.request_failures,
        "backfill finished"
    );
    stats
}

pub fn backfill(
    tickers: &TickerList,
    provider: &dyn SharesProvider,
    history: &mut SharesHistory,
    opts: &BackfillOptions,
) -> BackfillReport {
    BackfillReport {
        tickers: tickers
            .iter()
            .map(|t| backfill_ticker(t, provider, history, opts))
            .collect(),
    }
}
