//! Fundflow CLI: shares scraping, backfill and flow report commands.
//!
//! Commands:
//! - `scrape`: latest shares snapshot for every configured fund
//! - `backfill`: historical snapshots over a business-day range
//! - `flows`: optional scrape, then one JSON flow report per fund
//! - `history`: coverage of the shares history table
//! - `cache status`: date ranges held in the price cache

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fundflow_core::data::{CircuitBreaker, ISharesProvider, PriceCache, YahooProvider};
use fundflow_core::{SharesHistory, TickerList};
use fundflow_runner::{
    run_backfill, run_flows, run_scrape, BackfillOptions, FlowOptions, PipelineConfig,
    Providers, ScrapeOutcome, SymbolOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fundflow", about = "Fundflow: ETF fund flows from shares outstanding")]
struct Cli {
    /// Pipeline config (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ticker list, overriding `tickers_file` from the config.
    #[arg(long, global = true)]
    tickers: Option<PathBuf>,

    /// Emit logs as JSON lines (also FUNDFLOW_LOG_FORMAT=json).
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the latest shares outstanding for every configured fund.
    Scrape,
    /// Request historical snapshots for each business day in a range.
    Backfill {
        /// Start date (YYYY-MM-DD). Defaults to `backfill_start` from the config.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to yesterday.
        #[arg(long)]
        end: Option<String>,

        /// Pause between requests in milliseconds, overriding the config.
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Build flow reports for the configured funds.
    Flows {
        /// Prices from the cache only; no scrape and no enrichment.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use the existing shares history without scraping first.
        #[arg(long, default_value_t = false)]
        skip_scrape: bool,

        /// Restrict the run to these symbols.
        #[arg(long = "symbol")]
        symbols: Vec<String>,
    },
    /// Show shares history coverage, or the full series for one symbol.
    History {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Price cache commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached date ranges and bar counts per configured fund.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = PipelineConfig::load_or_default(cli.config.as_deref())?;
    if let Some(tickers) = cli.tickers {
        config.tickers_file = tickers;
    }
    tracing::debug!(
        tickers = %config.tickers_file.display(),
        history = %config.history_csv.display(),
        output = %config.output_dir.display(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Scrape => run_scrape_cmd(&config),
        Commands::Backfill {
            start,
            end,
            delay_ms,
        } => run_backfill_cmd(&config, start.as_deref(), end.as_deref(), delay_ms),
        Commands::Flows {
            offline,
            skip_scrape,
            symbols,
        } => run_flows_cmd(&config, offline, skip_scrape, &symbols),
        Commands::History { symbol } => run_history(&config.history_csv, symbol.as_deref()),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config),
        },
    }
}

fn init_logging(json_flag: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = json_flag
        || std::env::var("FUNDFLOW_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_tickers(config: &PipelineConfig) -> Result<TickerList> {
    TickerList::from_file(&config.tickers_file)
        .with_context(|| format!("loading tickers from {}", config.tickers_file.display()))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn ishares_provider(config: &PipelineConfig) -> Result<ISharesProvider> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    Ok(ISharesProvider::with_base_url(
        &config.ishares_base_url,
        circuit_breaker,
    )?)
}

fn run_scrape_cmd(config: &PipelineConfig) -> Result<()> {
    let tickers = load_tickers(config)?;
    let provider = ishares_provider(config)?;

    let (summary, history) = run_scrape(config, &tickers, &provider)?;

    println!(
        "Shares history saved to {} ({} entries)",
        config.history_csv.display(),
        history.len()
    );
    if summary.stored_count() == 0 {
        println!("WARNING: no shares data scraped");
    }
    for (symbol, outcome) in &summary.results {
        match outcome {
            ScrapeOutcome::Stored { as_of, shares, .. } => {
                println!("  {symbol}: {as_of} = {shares} shares outstanding")
            }
            ScrapeOutcome::Skipped => println!("  {symbol}: no iShares config, skipped"),
            ScrapeOutcome::Failed(e) => println!("  {symbol}: failed ({e})"),
        }
    }
    Ok(())
}

fn run_backfill_cmd(
    config: &PipelineConfig,
    start: Option<&str>,
    end: Option<&str>,
    delay_ms: Option<u64>,
) -> Result<()> {
    let start = match start {
        Some(s) => parse_date(s)?,
        None => config.backfill_start,
    };
    let end = match end {
        Some(e) => parse_date(e)?,
        None => chrono::Local::now().date_naive() - chrono::Duration::days(1),
    };
    if end < start {
        bail!("--end {end} is before --start {start}");
    }

    let tickers = load_tickers(config)?;
    let provider = ishares_provider(config)?;
    let opts = BackfillOptions {
        start,
        end,
        delay: delay_ms.map_or_else(|| config.request_delay(), Duration::from_millis),
    };

    println!("=== Shares backfill: {start} to {end} ===");
    let (report, history) = run_backfill(config, &tickers, &provider, &opts)?;

    println!();
    println!(
        "{:<8} {:>8} {:>8} {:>8} {:>8} {:>10} {:>9}",
        "Symbol", "Added", "Had", "NoData", "Mismatch", "Failures", "Abandoned"
    );
    println!("{}", "-".repeat(66));
    for t in &report.tickers {
        if t.unconfigured {
            println!("{:<8} (no iShares config)", t.symbol);
            continue;
        }
        println!(
            "{:<8} {:>8} {:>8} {:>8} {:>8} {:>10} {:>9}",
            t.symbol,
            t.added,
            t.skipped_existing,
            t.no_data,
            t.date_mismatch,
            t.request_failures,
            t.abandoned
        );
    }
    println!();
    if report.total_added() > 0 {
        println!(
            "Saved {} total entries to {} (+{} new)",
            history.len(),
            config.history_csv.display(),
            report.total_added()
        );
    } else {
        println!("No new data to save.");
    }
    Ok(())
}

fn run_flows_cmd(
    config: &PipelineConfig,
    offline: bool,
    skip_scrape: bool,
    symbols: &[String],
) -> Result<()> {
    let mut tickers = load_tickers(config)?;
    if !symbols.is_empty() {
        tickers = tickers.select(symbols)?;
    }

    let shares_cb = Arc::new(CircuitBreaker::default_provider());
    let yahoo_cb = Arc::new(CircuitBreaker::default_provider());
    let ishares = ISharesProvider::with_base_url(&config.ishares_base_url, shares_cb)?;
    let yahoo = YahooProvider::with_endpoints(config.yahoo_endpoints(), yahoo_cb)?;

    let providers = if offline {
        Providers::default()
    } else {
        Providers {
            shares: Some(&ishares),
            prices: Some(&yahoo),
            fund_data: Some(&yahoo),
        }
    };
    let opts = FlowOptions {
        offline,
        skip_scrape,
        ..FlowOptions::now()
    };

    let summary = run_flows(config, &tickers, providers, &opts)?;

    if let Some(scrape) = &summary.scrape {
        println!(
            "Scrape: {} stored, {} changed, {} failed",
            scrape.stored_count(),
            scrape.changed_count(),
            scrape.failed_count()
        );
    }
    for (symbol, outcome) in &summary.symbols {
        match outcome {
            SymbolOutcome::Written { path, flows, .. } => {
                println!("  Wrote {} ({flows} data points)", path.display())
            }
            SymbolOutcome::Skipped { reason } => println!("Skipping {symbol}: {reason}"),
        }
    }
    println!("{} of {} reports written.", summary.written(), summary.symbols.len());
    Ok(())
}

fn run_history(history_csv: &Path, symbol: Option<&str>) -> Result<()> {
    let history = SharesHistory::load(history_csv)
        .with_context(|| format!("loading {}", history_csv.display()))?;

    if history.is_empty() {
        println!("Shares history is empty: {}", history_csv.display());
        return Ok(());
    }

    if let Some(symbol) = symbol {
        let symbol = symbol.trim().to_ascii_uppercase();
        let series = history.get_series(&symbol);
        if series.is_empty() {
            println!("No observations for {symbol}");
            return Ok(());
        }
        println!("{:<12} {:>16}", "Date", "Shares");
        println!("{}", "-".repeat(29));
        for point in &series {
            println!("{:<12} {:>16}", point.date, point.shares);
        }
        return Ok(());
    }

    println!("History: {}", history_csv.display());
    println!("Entries: {}", history.len());
    println!();
    println!(
        "{:<8} {:>8} {:<12} {:<12} {:>16}",
        "Symbol", "Obs", "First", "Last", "Latest Shares"
    );
    println!("{}", "-".repeat(60));
    for stats in history.symbol_stats() {
        println!(
            "{:<8} {:>8} {:<12} {:<12} {:>16}",
            stats.symbol,
            stats.observations,
            stats.first_date,
            stats.last_date,
            stats.latest_shares
        );
    }
    Ok(())
}

fn run_cache_status(config: &PipelineConfig) -> Result<()> {
    let tickers = load_tickers(config)?;
    let cache = PriceCache::new(&config.price_cache_dir);

    println!("Cache: {}", cache.cache_dir().display());
    println!();
    println!("{:<8} {:<25} {:>8} {:<20}", "Symbol", "Date Range", "Bars", "Fetched");
    println!("{}", "-".repeat(64));
    for symbol in tickers.symbols() {
        match cache.entry(symbol) {
            Some(entry) => println!(
                "{:<8} {:<25} {:>8} {:<20}",
                symbol,
                format!("{} to {}", entry.first_date, entry.last_date),
                entry.bars,
                entry.fetched_at.format("%Y-%m-%d %H:%M").to_string()
            ),
            None => println!("{:<8} {:<25} {:>8}", symbol, "(not cached)", "-"),
        }
    }
    Ok(())
}
