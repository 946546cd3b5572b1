//! Price data source configuration.

use super::EnvLookup;
use crate::domain::errors::ConfigError;
use crate::domain::market::SymbolSpec;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Where daily price history comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Yahoo => write!(f, "yahoo"),
            DataSource::Csv => write!(f, "csv"),
            DataSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

impl FromStr for DataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yahoo" => Ok(DataSource::Yahoo),
            "csv" => Ok(DataSource::Csv),
            "synthetic" | "mock" => Ok(DataSource::Synthetic),
            _ => anyhow::bail!(
                "Invalid DATA_SOURCE: {}. Must be 'yahoo', 'csv', or 'synthetic'",
                s
            ),
        }
    }
}

/// Symbols, date window and provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub source: DataSource,
    pub symbols: Vec<SymbolSpec>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Directory holding `<ticker>.csv` files for the CSV source
    pub csv_dir: PathBuf,
    pub yahoo_base_url: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            symbols: SymbolSpec::default_indices(),
            start_date: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            csv_dir: PathBuf::from("data"),
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
        }
    }
}

impl DataSourceConfig {
    pub fn from_lookup(lookup: &EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();

        let source = match lookup("DATA_SOURCE") {
            Some(raw) => DataSource::from_str(&raw)?,
            None => defaults.source,
        };
        let symbols = match lookup("SYMBOLS") {
            Some(raw) => parse_symbols(&raw)?,
            None => defaults.symbols,
        };
        let start_date = match lookup("START_DATE") {
            Some(raw) => parse_date("START_DATE", &raw)?,
            None => defaults.start_date,
        };
        let end_date = match lookup("END_DATE") {
            Some(raw) => parse_date("END_DATE", &raw)?,
            None => defaults.end_date,
        };

        Ok(Self {
            source,
            symbols,
            start_date,
            end_date,
            csv_dir: lookup("CSV_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.csv_dir),
            yahoo_base_url: lookup("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid {
                field: "symbols",
                reason: "at least one symbol is required".to_string(),
            });
        }
        if self.start_date >= self.end_date {
            return Err(ConfigError::Invalid {
                field: "start_date",
                reason: format!(
                    "{} must be before end date {}",
                    self.start_date, self.end_date
                ),
            });
        }
        Ok(())
    }
}

/// Comma-separated `TICKER` or `TICKER=Name` items.
pub fn parse_symbols(raw: &str) -> Result<Vec<SymbolSpec>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SymbolSpec::from_str)
        .collect()
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .context(format!("Failed to parse {} (expected YYYY-MM-DD)", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_defaults() {
        let config = DataSourceConfig::from_lookup(&|_: &str| -> Option<String> { None }).unwrap();
        assert_eq!(config.source, DataSource::Yahoo);
        assert_eq!(config.symbols.len(), 4);
        assert_eq!(config.symbols[0].ticker, "^GSPC");
        assert_eq!(config.start_date.to_string(), "2010-01-01");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_symbol_list_parsing() {
        let symbols = parse_symbols("^GSPC=S&P 500, SPY ,").unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "S&P 500");
        assert_eq!(symbols[1].ticker, "SPY");
        assert!(parse_symbols("=Nameless").is_err());
    }

    #[test]
    fn test_data_source_parsing() {
        assert_eq!("CSV".parse::<DataSource>().unwrap(), DataSource::Csv);
        assert_eq!("mock".parse::<DataSource>().unwrap(), DataSource::Synthetic);
        assert!("bloomberg".parse::<DataSource>().is_err());
    }

    #[test]
    fn test_window_validation() {
        let lookup = |key: &str| match key {
            "START_DATE" => Some("2020-01-01".to_string()),
            "END_DATE" => Some("2019-01-01".to_string()),
            _ => None,
        };
        let config = DataSourceConfig::from_lookup(&lookup).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "start_date", .. })
        ));

        let bad = |key: &str| (key == "END_DATE").then(|| "31/12/2023".to_string());
        let err = DataSourceConfig::from_lookup(&bad).unwrap_err();
        assert!(err.to_string().contains("END_DATE"));
    }
}
