//! Ticker configuration: the funds to process and their provider identifiers.
//!
//! Stored as TOML (or JSON, chosen by file extension) with a top-level
//! `tickers` array. Entries are either a bare symbol or a table carrying the
//! iShares product identifiers used for shares scraping:
//!
//! ```toml
//! tickers = [
//!     "SPY",
//!     { symbol = "EWY", ishares_product_id = "239681", ishares_name = "ishares-msci-south-korea-capped-etf" },
//! ]
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(String),

    #[error("no tickers configured")]
    NoTickers,

    #[error("ticker '{0}' is configured more than once")]
    DuplicateSymbol(String),

    #[error("ticker '{0}' is not configured")]
    UnknownSymbol(String),

    #[error("unsupported config format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),
}

/// One fund and its optional provider identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerConfig {
    pub symbol: String,
    #[serde(
        default,
        deserialize_with = "de_opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub ishares_product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ishares_name: Option<String>,
}

/// Identifiers addressing a fund's iShares holdings export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ISharesIds<'a> {
    pub product_id: &'a str,
    pub name: &'a str,
}

impl TickerConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ishares_product_id: None,
            ishares_name: None,
        }
    }

    pub fn with_ishares(mut self, product_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.ishares_product_id = Some(product_id.into());
        self.ishares_name = Some(name.into());
        self
    }

    /// Both identifiers, when present and non-empty. `None` means shares
    /// scraping is skipped for this fund.
    pub fn ishares(&self) -> Option<ISharesIds<'_>> {
        let product_id = self.ishares_product_id.as_deref().filter(|s| !s.is_empty())?;
        let name = self.ishares_name.as_deref().filter(|s| !s.is_empty())?;
        Some(ISharesIds { product_id, name })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TickerEntry {
    Symbol(String),
    Full(TickerConfig),
}

#[derive(Debug, Deserialize)]
struct TickerFile {
    #[serde(default)]
    tickers: Vec<TickerEntry>,
}

#[derive(Serialize)]
struct TickerFileRef<'a> {
    tickers: &'a [TickerConfig],
}

/// Validated, non-empty list of configured funds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerList {
    tickers: Vec<TickerConfig>,
}

impl TickerList {
    /// Load a ticker list; `.json` files are read as JSON, everything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") | None => Self::from_toml(&content),
            Some(other) => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: TickerFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(format!("tickers TOML: {e}")))?;
        Self::from_entries(file.tickers)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let file: TickerFile = serde_json::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("tickers JSON: {e}")))?;
        Self::from_entries(file.tickers)
    }

    pub fn new(tickers: Vec<TickerConfig>) -> Result<Self, ConfigError> {
        Self::from_entries(tickers.into_iter().map(TickerEntry::Full).collect())
    }

    fn from_entries(entries: Vec<TickerEntry>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut tickers = Vec::with_capacity(entries.len());

        for entry in entries {
            let mut config = match entry {
                TickerEntry::Symbol(symbol) => TickerConfig::new(symbol),
                TickerEntry::Full(config) => config,
            };
            config.symbol = config.symbol.trim().to_uppercase();
            if config.symbol.is_empty() {
                continue;
            }
            if !seen.insert(config.symbol.clone()) {
                return Err(ConfigError::DuplicateSymbol(config.symbol));
            }
            tickers.push(config);
        }

        if tickers.is_empty() {
            return Err(ConfigError::NoTickers);
        }
        Ok(Self { tickers })
    }

    /// Restrict to the given symbols (case-insensitive), keeping config order.
    pub fn select(&self, symbols: &[String]) -> Result<Self, ConfigError> {
        let wanted: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        if let Some(missing) = wanted.iter().find(|w| self.get(w).is_none()) {
            return Err(ConfigError::UnknownSymbol(missing.clone()));
        }
        let tickers: Vec<TickerConfig> = self
            .tickers
            .iter()
            .filter(|t| wanted.contains(&t.symbol))
            .cloned()
            .collect();
        if tickers.is_empty() {
            return Err(ConfigError::NoTickers);
        }
        Ok(Self { tickers })
    }

    pub fn get(&self, symbol: &str) -> Option<&TickerConfig> {
        self.tickers.iter().find(|t| t.symbol == symbol)
    }

    pub fn tickers(&self) -> &[TickerConfig] {
        &self.tickers
    }

    pub fn iter(&self) -> impl Iterator<Item = &TickerConfig> {
        self.tickers.iter()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.tickers.iter().map(|t| t.symbol.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&TickerFileRef {
            tickers: &self.tickers,
        })
        .map_err(|e| ConfigError::Parse(format!("serialize tickers: {e}")))
    }
}

/// Product ids show up both as strings and as bare numbers in existing configs.
fn de_opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Str(String),
        Int(i64),
    }

    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
        }),
    )
}
