use statrs::statistics::Statistics;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Shared statistics utilities for return series.
pub struct Stats;

impl Stats {
    /// Sharpe ratio of daily returns (zero risk-free rate).
    ///
    /// returns: daily returns
    /// annualize: if true, multiplies by sqrt(252)
    pub fn sharpe_ratio(returns: &[f64], annualize: bool) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let mean_return = returns.mean();
        // Sample standard deviation (n-1)
        let std_dev = returns.std_dev();

        if std_dev > 1e-9 {
            let ratio = mean_return / std_dev;
            if annualize {
                ratio * TRADING_DAYS_PER_YEAR.sqrt()
            } else {
                ratio
            }
        } else {
            0.0
        }
    }

    /// Largest peak-to-trough decline of a cumulative return curve, as a
    /// non-positive fraction of the peak wealth.
    pub fn max_drawdown(cumulative_returns: &[f64]) -> f64 {
        let mut max_dd: f64 = 0.0;
        let mut peak = f64::NEG_INFINITY;

        for &r in cumulative_returns {
            let wealth = 1.0 + r;
            if wealth > peak {
                peak = wealth;
            }
            if peak > 0.0 {
                let drawdown = ((wealth - peak) / peak).max(-1.0);
                max_dd = max_dd.min(drawdown);
            }
        }

        max_dd
    }
}
