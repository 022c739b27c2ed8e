//! Fundflow Runner: batch orchestration on top of `fundflow-core`.
//!
//! This crate provides:
//! - Pipeline configuration with file defaults
//! - Latest-snapshot scrape and date-guarded historical backfill
//! - Price loading with download/cache fallback
//! - Per-symbol flow reports and their JSON export

pub mod backfill;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod prices;
pub mod report;
pub mod scrape;

pub use backfill::{backfill, backfill_ticker, BackfillOptions, BackfillReport, BackfillStats};
pub use config::PipelineConfig;
pub use export::{export_json, import_json, read_report, write_report};
pub use pipeline::{
    run_backfill, run_flows, run_scrape, FlowOptions, PipelineError, Providers, RunSummary,
    SymbolOutcome,
};
pub use prices::{load_prices, LoadError, LoadOptions, LoadedPrices};
pub use report::{Enrichment, FlowReport, ReportInput};
pub use scrape::{scrape_latest, ScrapeOutcome, ScrapeSummary};
