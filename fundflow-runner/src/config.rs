//! Pipeline configuration.
//!
//! Every key is optional; a missing file section falls back to the defaults
//! below, so an empty `fundflow.toml` is a valid configuration.

use chrono::NaiveDate;
use fundflow_core::data::{YahooEndpoints, DEFAULT_ISHARES_BASE_URL};
use fundflow_core::series::DEFAULT_WINDOW_DAYS;
use fundflow_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File locations, window length, pacing and provider endpoints for a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ticker list (TOML or JSON by extension).
    pub tickers_file: PathBuf,

    /// Persisted shares history table.
    pub history_csv: PathBuf,

    /// Root of the Parquet price cache.
    pub price_cache_dir: PathBuf,

    /// Directory receiving one `{SYMBOL}.json` report per fund.
    pub output_dir: PathBuf,

    /// Calendar days of flow records kept in each report.
    pub window_days: i64,

    /// Pause after every historical snapshot request.
    pub request_delay_ms: u64,

    /// First date a backfill asks for when `--start` is not given.
    /// Written as a quoted `"YYYY-MM-DD"` string.
    pub backfill_start: NaiveDate,

    /// Holdings kept in each report.
    pub top_holdings: usize,

    pub ishares_base_url: String,
    pub yahoo_chart_url: String,
    pub yahoo_summary_url: String,
    pub yahoo_cookie_url: String,
    pub yahoo_crumb_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let yahoo = YahooEndpoints::default();
        Self {
            tickers_file: PathBuf::from("tickers.toml"),
            history_csv: PathBuf::from("data/shares_history.csv"),
            price_cache_dir: PathBuf::from("data/prices"),
            output_dir: PathBuf::from("public/data"),
            window_days: DEFAULT_WINDOW_DAYS,
            request_delay_ms: 1500,
            backfill_start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap_or_default(),
            top_holdings: 10,
            ishares_base_url: DEFAULT_ISHARES_BASE_URL.to_string(),
            yahoo_chart_url: yahoo.chart,
            yahoo_summary_url: yahoo.summary,
            yahoo_cookie_url: yahoo.cookie,
            yahoo_crumb_url: yahoo.crumb,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.window_days <= 0 {
            return Err(ConfigError::Parse(format!(
                "window_days must be positive, got {}",
                config.window_days
            )));
        }
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn yahoo_endpoints(&self) -> YahooEndpoints {
        YahooEndpoints {
            chart: self.yahoo_chart_url.clone(),
            summary: self.yahoo_summary_url.clone(),
            cookie: self.yahoo_cookie_url.clone(),
            crumb: self.yahoo_crumb_url.clone(),
        }
    }
}
