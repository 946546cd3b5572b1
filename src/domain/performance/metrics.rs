use super::accountant::PerformanceRecord;
use super::stats::Stats;
use serde::{Deserialize, Serialize};

/// Headline figures of one test-period backtest.
///
/// Returns are fractions (0.1 = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub trading_days: usize,

    // Returns
    pub compounded_return: f64,
    pub simple_return: f64,
    pub buy_and_hold_return: f64,
    pub excess_return: f64,

    // Risk
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub buy_and_hold_max_drawdown: f64,

    // Activity
    pub total_trades: usize,
    pub average_exposure: f64,
}

impl PerformanceSummary {
    pub fn from_records(records: &[PerformanceRecord]) -> Self {
        let Some(last) = records.last() else {
            return Self::default();
        };

        let daily: Vec<f64> = records.iter().map(|r| r.portfolio_return).collect();
        let compounded: Vec<f64> = records
            .iter()
            .map(|r| r.cumulative_compounded_return)
            .collect();
        let benchmark: Vec<f64> = records.iter().map(|r| r.buy_and_hold_return).collect();

        Self {
            trading_days: records.len(),
            compounded_return: last.cumulative_compounded_return,
            simple_return: last.cumulative_simple_return,
            buy_and_hold_return: last.buy_and_hold_return,
            excess_return: last.cumulative_compounded_return - last.buy_and_hold_return,
            sharpe_ratio: Stats::sharpe_ratio(&daily, true),
            max_drawdown: Stats::max_drawdown(&compounded),
            buy_and_hold_max_drawdown: Stats::max_drawdown(&benchmark),
            total_trades: records.iter().filter(|r| r.action.is_trade()).count(),
            average_exposure: records.iter().map(|r| r.target_exposure).sum::<f64>()
                / records.len() as f64,
        }
    }
}
