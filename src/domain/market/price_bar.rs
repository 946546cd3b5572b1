use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Daily price bar for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: f64, close: f64) -> Self {
        Self { date, open, close }
    }
}

/// Ticker plus a human-readable name, e.g. `^GSPC` / `S&P 500`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub ticker: String,
    pub name: String,
}

impl SymbolSpec {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
        }
    }

    /// The four equity indices analysed by default.
    pub fn default_indices() -> Vec<SymbolSpec> {
        vec![
            SymbolSpec::new("^GSPC", "S&P 500"),
            SymbolSpec::new("^DJI", "Dow Jones Industrial Average"),
            SymbolSpec::new("^IXIC", "NASDAQ Composite"),
            SymbolSpec::new("^RUT", "Russell 2000"),
        ]
    }
}

impl fmt::Display for SymbolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() || self.name == self.ticker {
            write!(f, "{}", self.ticker)
        } else {
            write!(f, "{} ({})", self.name, self.ticker)
        }
    }
}

/// Parses `TICKER` or `TICKER=Display Name`.
impl FromStr for SymbolSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ticker, name) = match s.split_once('=') {
            Some((ticker, name)) => (ticker.trim(), name.trim()),
            None => (s.trim(), s.trim()),
        };
        if ticker.is_empty() {
            anyhow::bail!("Symbol must not be empty: '{}'", s);
        }
        Ok(SymbolSpec::new(ticker, name))
    }
}
