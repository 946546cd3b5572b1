use crate::domain::regime::SemanticLabel;
use crate::domain::trading::{Action, TradeLogEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trade log entry with derived performance columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub action: Action,
    pub target_exposure: f64,
    pub open_price: f64,
    pub regime: SemanticLabel,
    /// `open[i] / open[i-1] - 1`, zero on the first entry
    pub open_price_pct_change: f64,
    pub portfolio_return: f64,
    /// Running product of `1 + portfolio_return`, minus one
    pub cumulative_compounded_return: f64,
    /// Running sum of `portfolio_return`
    pub cumulative_simple_return: f64,
    /// `open[i] / open[0] - 1`
    pub buy_and_hold_return: f64,
}

/// Turns a trade log into day-over-day and cumulative portfolio returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceAccountant;

struct Running {
    previous_open: f64,
    previous_exposure: f64,
    wealth: f64,
    simple: f64,
}

impl PerformanceAccountant {
    pub fn new() -> Self {
        Self
    }

    /// Fraction of the day's open-to-open move earned by the portfolio.
    ///
    /// Hold carries the exposure already held from the previous day.
    pub fn daily_return(action: Action, previous_exposure: f64, pct_change: f64) -> f64 {
        match action {
            Action::BuyFull => pct_change,
            Action::BuyHalf | Action::SellHalf => 0.5 * pct_change,
            Action::SellAll => 0.0,
            Action::Hold => previous_exposure * pct_change,
        }
    }

    pub fn account(&self, trade_log: &[TradeLogEntry]) -> Vec<PerformanceRecord> {
        let Some(first) = trade_log.first() else {
            return Vec::new();
        };
        let base_open = first.open_price;

        let state = Running {
            previous_open: base_open,
            previous_exposure: first.target_exposure,
            wealth: 1.0,
            simple: 0.0,
        };

        trade_log
            .iter()
            .scan(state, |state, entry| {
                let pct_change = entry.open_price / state.previous_open - 1.0;
                let portfolio_return =
                    Self::daily_return(entry.action, state.previous_exposure, pct_change);

                state.wealth *= 1.0 + portfolio_return;
                state.simple += portfolio_return;
                state.previous_open = entry.open_price;
                state.previous_exposure = match entry.action {
                    Action::Hold => state.previous_exposure,
                    _ => entry.target_exposure,
                };

                Some(PerformanceRecord {
                    date: entry.date,
                    action: entry.action,
                    target_exposure: entry.target_exposure,
                    open_price: entry.open_price,
                    regime: entry.regime,
                    open_price_pct_change: pct_change,
                    portfolio_return,
                    cumulative_compounded_return: state.wealth - 1.0,
                    cumulative_simple_return: state.simple,
                    buy_and_hold_return: entry.open_price / base_open - 1.0,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u64, action: Action, exposure: f64, open: f64) -> TradeLogEntry {
        TradeLogEntry {
            date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap() + chrono::Days::new(day),
            action,
            target_exposure: exposure,
            open_price: open,
            regime: SemanticLabel::Neutral,
        }
    }

    #[test]
    fn test_full_hold_matches_buy_and_hold() {
        let opens = [100.0, 102.0, 99.5, 101.0, 105.3, 104.1, 108.0];
        let log: Vec<TradeLogEntry> = opens
            .iter()
            .enumerate()
            .map(|(i, &o)| entry(i as u64, Action::Hold, 1.0, o))
            .collect();

        let records = PerformanceAccountant::new().account(&log);
        assert_eq!(records.len(), log.len());
        for r in &records {
            assert!((r.cumulative_compounded_return - r.buy_and_hold_return).abs() < 1e-12);
        }
        assert_eq!(records[0].open_price_pct_change, 0.0);
        assert_eq!(records[0].portfolio_return, 0.0);
        assert!((records[6].buy_and_hold_return - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_action_returns() {
        let log = vec![
            entry(0, Action::Hold, 0.0, 100.0),
            entry(1, Action::BuyFull, 1.0, 110.0),
            entry(2, Action::SellHalf, 0.5, 121.0),
            entry(3, Action::Hold, 0.5, 133.1),
            entry(4, Action::SellAll, 0.0, 100.0),
            entry(5, Action::Hold, 0.0, 120.0),
            entry(6, Action::BuyHalf, 0.5, 132.0),
        ];
        let records = PerformanceAccountant::new().account(&log);
        let returns: Vec<f64> = records.iter().map(|r| r.portfolio_return).collect();
        let expected = [0.0, 0.1, 0.05, 0.05, 0.0, 0.0, 0.05];
        for (got, want) in returns.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }

        let last = records.last().unwrap();
        assert!((last.cumulative_simple_return - 0.25).abs() < 1e-9);
        let compounded = 1.1 * 1.05 * 1.05 * 1.05 - 1.0;
        assert!((last.cumulative_compounded_return - compounded).abs() < 1e-9);
        assert!((last.buy_and_hold_return - 0.32).abs() < 1e-9);
    }

    #[test]
    fn test_empty_log() {
        assert!(PerformanceAccountant::new().account(&[]).is_empty());
    }
}
