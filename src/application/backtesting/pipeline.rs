use crate::config::PipelineConfig;
use crate::domain::errors::RegimeError;
use crate::domain::market::{PriceBar, ReturnSeries, SymbolSpec};
use crate::domain::performance::{PerformanceAccountant, PerformanceRecord, PerformanceSummary};
use crate::domain::regime::{
    DecodedRow, LabelMapping, LabelMeans, LabeledRow, ModelSummary, RegimeLabeler, RegimeModel,
};
use crate::domain::trading::{PolicyEngine, TradeLogEntry};
use crate::domain::validation::PriceSeriesValidator;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

/// Everything one symbol's run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RegimeRunReport {
    pub symbol: SymbolSpec,
    pub n_bars: usize,
    pub train_len: usize,
    pub test_len: usize,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub model: ModelSummary,
    /// Log-likelihood of the held-out returns under the trained model
    pub test_log_likelihood: f64,
    pub mapping: LabelMapping,
    pub label_means: LabelMeans,
    pub labeled: Vec<LabeledRow>,
    pub trade_log: Vec<TradeLogEntry>,
    pub performance: Vec<PerformanceRecord>,
    pub summary: PerformanceSummary,
}

/// Train/decode/label/trade pipeline for a single symbol.
///
/// Stateless between runs: each call builds its own model from the explicit
/// configuration, so runs for different symbols can execute in parallel.
#[derive(Debug, Clone)]
pub struct RegimePipeline {
    config: PipelineConfig,
}

impl RegimePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, symbol: &SymbolSpec, bars: &[PriceBar]) -> Result<RegimeRunReport, RegimeError> {
        let config = &self.config;
        config.validate()?;
        let labeler = RegimeLabeler::new(config.n_states)?;

        PriceSeriesValidator::validate(&symbol.ticker, bars)?;
        let series = ReturnSeries::from_bars(bars)?;
        let split = series.split(config.test_fraction)?;
        info!(
            "{}: {} returns, {} train / {} test",
            symbol,
            series.len(),
            split.train().len(),
            split.test().len()
        );

        let model = RegimeModel::fit(
            &split.train_log_returns(),
            config.n_states,
            config.covariance_mode,
            &config.fit_options(),
        )?;

        let test_returns = split.test_log_returns();
        let test_log_likelihood = model.score(&test_returns)?;
        let states = model.decode(&test_returns)?;

        let decoded: Vec<DecodedRow> = split
            .test()
            .iter()
            .zip(&states)
            .map(|(point, &state)| DecodedRow {
                date: point.date,
                open: point.open,
                close: point.close,
                log_return: point.log_return,
                state,
            })
            .collect();

        let mapping = labeler.assign(&decoded, model.fitted())?;
        let label_means = labeler.verify(&decoded, &mapping)?;
        info!("{}: regimes {} ({})", symbol, mapping, label_means);
        let labeled = labeler.apply(&decoded, &mapping)?;

        let trade_log = PolicyEngine::new().run(&decoded, &mapping)?;
        let performance = PerformanceAccountant::new().account(&trade_log);
        let summary = PerformanceSummary::from_records(&performance);
        info!(
            "{}: strategy {:.2}% vs buy-and-hold {:.2}% over {} days, {} trades",
            symbol,
            summary.compounded_return * 100.0,
            summary.buy_and_hold_return * 100.0,
            summary.trading_days,
            summary.total_trades
        );

        let test = split.test();
        Ok(RegimeRunReport {
            symbol: symbol.clone(),
            n_bars: bars.len(),
            train_len: split.train().len(),
            test_len: test.len(),
            test_start: test.first().map(|p| p.date).unwrap_or_default(),
            test_end: test.last().map(|p| p.date).unwrap_or_default(),
            model: model.summary(config.summary_samples, config.seed),
            test_log_likelihood,
            mapping,
            label_means,
            labeled,
            trade_log,
            performance,
            summary,
        })
    }
}
