use super::pipeline::{RegimePipeline, RegimeRunReport};
use crate::domain::errors::{DataError, RegimeError};
use crate::domain::market::SymbolSpec;
use crate::domain::ports::MarketDataService;
use chrono::NaiveDate;
use futures::future::join_all;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a single symbol's run in a batch
#[derive(Debug)]
pub struct SymbolRunResult {
    pub symbol: SymbolSpec,
    pub result: Result<RegimeRunReport, RegimeError>,
}

impl SymbolRunResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Multi-symbol runner.
///
/// Prices for all symbols are fetched concurrently, then the CPU-bound
/// pipelines run on the Rayon pool from a blocking task. A failing symbol never aborts the batch;
/// its error is returned in its slot and the remaining symbols proceed.
pub struct ParallelRegimeRunner {
    market_service: Arc<dyn MarketDataService>,
    pipeline: RegimePipeline,
}

impl ParallelRegimeRunner {
    pub fn new(market_service: Arc<dyn MarketDataService>, pipeline: RegimePipeline) -> Self {
        Self {
            market_service,
            pipeline,
        }
    }

    /// Run every symbol over `[start, end]`. Results keep the input order.
    pub async fn run_parallel(
        &self,
        symbols: &[SymbolSpec],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<SymbolRunResult> {
        let fetches = symbols.iter().map(|symbol| {
            let service = Arc::clone(&self.market_service);
            async move { service.fetch_prices(&symbol.ticker, start, end).await }
        });
        let fetched = join_all(fetches).await;

        // Keep the CPU-bound stage off the async worker threads
        let pipeline = self.pipeline.clone();
        let owned: Vec<SymbolSpec> = symbols.to_vec();
        let batch = tokio::task::spawn_blocking(move || {
            owned
                .into_par_iter()
                .zip(fetched.into_par_iter())
                .map(|(symbol, prices)| {
                    let result = prices
                        .map_err(RegimeError::from)
                        .and_then(|bars| pipeline.run(&symbol, &bars));
                    if let Err(e) = &result {
                        warn!("{}: skipped ({}): {}", symbol, e.kind(), e);
                    }
                    SymbolRunResult { symbol, result }
                })
                .collect::<Vec<_>>()
        })
        .await;

        let results = match batch {
            Ok(results) => results,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => symbols
                .iter()
                .map(|symbol| SymbolRunResult {
                    symbol: symbol.clone(),
                    result: Err(RegimeError::from(DataError::DataUnavailable {
                        symbol: symbol.ticker.clone(),
                        reason: format!("batch worker did not complete: {}", e),
                    })),
                })
                .collect(),
        };

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        info!(
            "Batch finished: {} of {} symbols succeeded",
            succeeded,
            results.len()
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::infrastructure::mock::SyntheticMarketDataService;

    #[tokio::test]
    async fn test_failed_fetch_does_not_abort_batch() {
        let service = SyntheticMarketDataService::new(11).with_unavailable("^DJI");
        let runner = ParallelRegimeRunner::new(
            Arc::new(service),
            RegimePipeline::new(PipelineConfig {
                summary_samples: 200,
                ..PipelineConfig::default()
            }),
        );
        let symbols = vec![
            SymbolSpec::new("^GSPC", "S&P 500"),
            SymbolSpec::new("^DJI", "Dow Jones Industrial Average"),
        ];
        let results = runner
            .run_parallel(
                &symbols,
                NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].symbol.ticker, "^GSPC");
        assert_eq!(results[1].symbol.ticker, "^DJI");
        let err = results[1].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), "data unavailable");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_batch_does_not_block_the_runtime() {
        let runner = ParallelRegimeRunner::new(
            Arc::new(SyntheticMarketDataService::new(3)),
            RegimePipeline::new(PipelineConfig {
                summary_samples: 200,
                ..PipelineConfig::default()
            }),
        );
        let symbols = vec![SymbolSpec::new("^GSPC", "S&P 500")];

        // On a single-threaded runtime the ticker only advances while the
        // pipeline stage runs elsewhere
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });

        let results = runner
            .run_parallel(
                &symbols,
                NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            )
            .await;
        ticker.abort();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 1);
    }
}
