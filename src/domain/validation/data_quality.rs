use crate::domain::errors::DataError;
use crate::domain::market::PriceBar;
use tracing::warn;

/// Validator for fetched daily price series.
///
/// Rejects prices that cannot produce a log-return and dates that break the
/// strictly increasing ordering.
pub struct PriceSeriesValidator;

impl PriceSeriesValidator {
    pub fn validate(symbol: &str, bars: &[PriceBar]) -> Result<(), DataError> {
        for bar in bars {
            Self::validate_bar(symbol, bar)?;
        }

        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            warn!(
                "Validation FAILED: {} has non-increasing dates {} -> {}",
                symbol, pair[0].date, pair[1].date
            );
            return Err(DataError::InvalidData {
                symbol: symbol.to_string(),
                date: pair[1].date,
                reason: format!("date does not follow {}", pair[0].date),
            });
        }

        Ok(())
    }

    pub fn validate_bar(symbol: &str, bar: &PriceBar) -> Result<(), DataError> {
        let bad = |field: &str, value: f64| DataError::InvalidData {
            symbol: symbol.to_string(),
            date: bar.date,
            reason: format!("{} price {} is not a positive finite number", field, value),
        };

        for (field, value) in [("open", bar.open), ("close", bar.close)] {
            if !(value.is_finite() && value > 0.0) {
                warn!(
                    "Validation FAILED: {} on {} has {} price {}",
                    symbol, bar.date, field, value
                );
                return Err(bad(field, value));
            }
        }
        Ok(())
    }
}
