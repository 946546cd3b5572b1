use crate::config::{DataSource, DataSourceConfig};
use crate::domain::ports::MarketDataService;
use crate::infrastructure::csv_market_data::CsvMarketDataService;
use crate::infrastructure::mock::SyntheticMarketDataService;
use crate::infrastructure::yahoo::YahooMarketDataService;
use std::sync::Arc;
use tracing::info;

pub struct ServiceFactory;

impl ServiceFactory {
    /// Price provider selected by `config.source`; `seed` drives the synthetic source.
    pub fn create_market_data_service(
        config: &DataSourceConfig,
        seed: u64,
    ) -> Arc<dyn MarketDataService> {
        info!("ServiceFactory: Using {} market data", config.source);
        match config.source {
            DataSource::Yahoo => Arc::new(YahooMarketDataService::new(config.yahoo_base_url.clone())),
            DataSource::Csv => Arc::new(CsvMarketDataService::new(config.csv_dir.clone())),
            DataSource::Synthetic => Arc::new(SyntheticMarketDataService::new(seed)),
        }
    }
}
