//! Latest-snapshot scrape for every configured fund.
//!
//! The latest snapshot is stored under whatever as-of date the document
//! states; no requested date exists to reconcile against. One fund failing
//! never stops the others.

use chrono::NaiveDate;
use fundflow_core::data::{DataError, SharesProvider};
use fundflow_core::{SharesHistory, TickerList, UpsertOutcome};

/// What happened to one fund during a scrape.
#[derive(Debug)]
pub enum ScrapeOutcome {
    Stored {
        as_of: NaiveDate,
        shares: u64,
        outcome: UpsertOutcome,
    },
    /// No provider identifiers configured.
    Skipped,
    Failed(DataError),
}

#[derive(Debug, Default)]
pub struct ScrapeSummary {
    pub results: Vec<(String, ScrapeOutcome)>,
}

impl ScrapeSummary {
    pub fn stored(&self) -> impl Iterator<Item = (&str, NaiveDate, u64)> {
        self.results.iter().filter_map(|(sym, r)| match r {
            ScrapeOutcome::Stored { as_of, shares, .. } => Some((sym.as_str(), *as_of, *shares)),
            _ => None,
        })
    }

    pub fn stored_count(&self) -> usize {
        self.stored().count()
    }

    pub fn changed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, ScrapeOutcome::Stored { outcome, .. } if outcome.is_changed()))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, ScrapeOutcome::Failed(_)))
            .count()
    }
}

pub fn scrape_latest(
    tickers: &TickerList,
    provider: &dyn SharesProvider,
    history: &mut SharesHistory,
) -> ScrapeSummary {
    let mut summary = ScrapeSummary::default();

    for ticker in tickers.iter() {
        let symbol = ticker.symbol.as_str();

        if ticker.ishares().is_none() {
            tracing::info!(symbol, "no shares provider identifiers, skipping");
            summary.results.push((symbol.to_string(), ScrapeOutcome::Skipped));
            continue;
        }

        let snapshot = match provider.fetch_snapshot(ticker, None) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(symbol, provider = provider.name(), error = %e, "shares scrape failed");
                summary.results.push((symbol.to_string(), ScrapeOutcome::Failed(e)));
                continue;
            }
        };

        let as_of = snapshot.as_of;
        let shares = snapshot.shares_outstanding;
        let outcome = history.upsert(as_of, symbol, shares);
        match outcome {
            UpsertOutcome::Inserted => {
                tracing::info!(symbol, %as_of, shares, "new shares entry");
            }
            UpsertOutcome::Updated { previous } => {
                tracing::info!(symbol, %as_of, previous, shares, "updated shares entry");
            }
            UpsertOutcome::Unchanged => {
                tracing::info!(symbol, %as_of, shares, "shares entry unchanged");
            }
        }

        summary.results.push((
            symbol.to_string(),
            ScrapeOutcome::Stored {
                as_of,
                shares,
                outcome,
            },
        ));
    }

    summary
}
