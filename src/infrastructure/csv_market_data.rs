use crate::domain::errors::DataError;
use crate::domain::market::PriceBar;
use crate::domain::ports::MarketDataService;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize)]
struct CsvBar {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "Close")]
    close: f64,
}

/// Daily history read from `<dir>/<ticker>.csv` files.
///
/// Needs `date` (YYYY-MM-DD), `open` and `close` columns; other columns are
/// ignored, so Yahoo-style exports load as they are.
pub struct CsvMarketDataService {
    dir: PathBuf,
}

impl CsvMarketDataService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }
}

/// Parse CSV text into bars within `[start, end]`, sorted by date.
pub fn parse_csv_bars(
    symbol: &str,
    raw: &[u8],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PriceBar>, DataError> {
    let mut reader = csv::Reader::from_reader(raw);
    let mut bars = Vec::new();

    for (line, result) in reader.deserialize::<CsvBar>().enumerate() {
        let record = result.map_err(|e| DataError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("malformed CSV record {}: {}", line + 1, e),
        })?;
        if record.date >= start && record.date <= end {
            bars.push(PriceBar::new(record.date, record.open, record.close));
        }
    }

    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}

async fn read_file(symbol: &str, path: &Path) -> Result<Vec<u8>, DataError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| DataError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("cannot read {}: {}", path.display(), e),
        })
}

#[async_trait]
impl MarketDataService for CsvMarketDataService {
    async fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let path = self.path_for(symbol);
        let raw = read_file(symbol, &path).await?;
        let bars = parse_csv_bars(symbol, &raw, start, end)?;

        if bars.is_empty() {
            return Err(DataError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no rows between {} and {} in {}", start, end, path.display()),
            });
        }
        info!(
            "CsvMarketDataService: Loaded {} bars for {} from {}",
            bars.len(),
            symbol,
            path.display()
        );
        Ok(bars)
    }
}
