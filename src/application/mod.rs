// Regime detection backtests
pub mod backtesting;
