use crate::domain::errors::DataError;
use crate::domain::market::PriceBar;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of daily price history.
#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Bars in `[start, end]`, ordered by date.
    ///
    /// Network failures and empty results are `DataError::DataUnavailable`.
    async fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError>;
}
