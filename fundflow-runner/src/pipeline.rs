//! Batch entry points: scrape, backfill and the per-symbol flow run.
//!
//! Each run loads the history table, does its work through the provider
//! traits, and persists the table with a whole-file atomic rewrite. Per-symbol
//! problems are logged and recorded in the run summary; only local
//! configuration and storage errors abort a run.

use crate::backfill::{backfill, BackfillOptions, BackfillReport};
use crate::config::PipelineConfig;
use crate::export::write_report;
use crate::prices::{load_prices, LoadOptions};
use crate::report::{Enrichment, FlowReport, ReportInput};
use crate::scrape::{scrape_latest, ScrapeSummary};
use chrono::{NaiveDate, NaiveDateTime};
use fundflow_core::data::{DataSource, FundDataProvider, PriceCache, PriceProvider, SharesProvider};
use fundflow_core::{
    derive, merge, summarize, window_records, ConfigError, SharesHistory, StoreError, TickerList,
};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("shares history: {0}")]
    Store(#[from] StoreError),
}

/// The outside world, as seen by a run. `None` disables that data kind.
#[derive(Clone, Copy, Default)]
pub struct Providers<'a> {
    pub shares: Option<&'a dyn SharesProvider>,
    pub prices: Option<&'a dyn PriceProvider>,
    pub fund_data: Option<&'a dyn FundDataProvider>,
}

#[derive(Debug, Clone, Copy)]
pub struct FlowOptions {
    /// Prices from the cache only; no scrape and no enrichment.
    pub offline: bool,
    pub skip_scrape: bool,
    /// Anchor of the reporting window.
    pub as_of: NaiveDate,
    /// Stamped into each report.
    pub generated_at: NaiveDateTime,
}

impl FlowOptions {
    pub fn now() -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            offline: false,
            skip_scrape: false,
            as_of: now.date(),
            generated_at: now,
        }
    }
}

#[derive(Debug)]
pub enum SymbolOutcome {
    Written {
        path: PathBuf,
        flows: usize,
        source: DataSource,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub scrape: Option<ScrapeSummary>,
    pub history_saved: bool,
    pub symbols: Vec<(String, SymbolOutcome)>,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.symbols
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Written { .. }))
            .count()
    }
}

/// Scrape the latest snapshot for every fund and rewrite the table.
pub fn run_scrape(
    config: &PipelineConfig,
    tickers: &TickerList,
    provider: &dyn SharesProvider,
) -> Result<(ScrapeSummary, SharesHistory), PipelineError> {
    let mut history = SharesHistory::load(&config.history_csv)?;
    let summary = scrape_latest(tickers, provider, &mut history);
    history.save(&config.history_csv)?;
    tracing::info!(
        path = %config.history_csv.display(),
        entries = history.len(),
        "shares history saved"
    );
    Ok((summary, history))
}

/// Backfill the requested date range. The table is rewritten only when
/// something was added.
pub fn run_backfill(
    config: &PipelineConfig,
    tickers: &TickerList,
    provider: &dyn SharesProvider,
    opts: &BackfillOptions,
) -> Result<(BackfillReport, SharesHistory), PipelineError> {
    let mut history = SharesHistory::load(&config.history_csv)?;
    tracing::info!(entries = history.len(), "existing shares history");

    let report = backfill(tickers, provider, &mut history, opts);
    if report.total_added() > 0 {
        history.save(&config.history_csv)?;
        tracing::info!(
            added = report.total_added(),
            entries = history.len(),
            "shares history saved"
        );
    } else {
        tracing::info!("no new shares data to save");
    }
    Ok((report, history))
}

/// Optional scrape, then one report per fund.
pub fn run_flows(
    config: &PipelineConfig,
    tickers: &TickerList,
    providers: Providers<'_>,
    opts: &FlowOptions,
) -> Result<RunSummary, PipelineError> {
    let mut history = SharesHistory::load(&config.history_csv)?;
    let mut summary = RunSummary::default();

    if !opts.offline && !opts.skip_scrape {
        match providers.shares {
            Some(shares) => {
                summary.scrape = Some(scrape_latest(tickers, shares, &mut history));
                summary.history_saved = history.save_if_dirty(&config.history_csv)?;
            }
            None => tracing::info!("no shares provider, using existing history"),
        }
    }

    let cache = PriceCache::new(&config.price_cache_dir);
    let price_opts = LoadOptions {
        offline: opts.offline,
    };

    for ticker in tickers.iter() {
        let symbol = ticker.symbol.as_str();
        let outcome = report_symbol(symbol, config, &history, &cache, providers, &price_opts, opts);
        if let SymbolOutcome::Skipped { reason } = &outcome {
            tracing::warn!(symbol, reason = %reason, "skipping symbol");
        }
        summary.symbols.push((symbol.to_string(), outcome));
    }

    Ok(summary)
}

fn report_symbol(
    symbol: &str,
    config: &PipelineConfig,
    history: &SharesHistory,
    cache: &PriceCache,
    providers: Providers<'_>,
    price_opts: &LoadOptions,
    opts: &FlowOptions,
) -> SymbolOutcome {
    let skip = |reason: String| SymbolOutcome::Skipped { reason };

    let shares = history.get_series(symbol);
    if shares.is_empty() {
        tracing::warn!(symbol, "no shares outstanding history");
    } else {
        tracing::debug!(symbol, points = shares.len(), "shares history");
    }

    let prices = match load_prices(symbol, cache, providers.prices, price_opts) {
        Ok(p) if p.is_empty() => return skip("no price history".into()),
        Ok(p) => p,
        Err(e) => return skip(e.to_string()),
    };

    let merged = merge(&prices.observations(), &shares);
    if merged.is_empty() {
        return skip("no trading days on or after the first shares observation".into());
    }

    let records = derive(&merged);
    let flow_summary = summarize(&records);
    let window = window_records(&records, opts.as_of, config.window_days);

    let enrichment = match providers.fund_data {
        Some(fund_data) if !opts.offline => Enrichment::fetch(fund_data, symbol),
        _ => Enrichment::default(),
    };

    let report = FlowReport::build(
        ReportInput {
            symbol,
            records: window,
            summary: flow_summary,
            latest_shares: merged.last().map(|r| r.shares),
            generated_at: opts.generated_at,
            top_holdings: config.top_holdings,
        },
        &enrichment,
    );

    match write_report(&report, &config.output_dir) {
        Ok(path) => {
            tracing::info!(symbol, path = %path.display(), flows = report.flows.len(), "wrote report");
            SymbolOutcome::Written {
                path,
                flows: report.flows.len(),
                source: prices.source,
            }
        }
        Err(e) => skip(format!("{e:#}")),
    }
}
