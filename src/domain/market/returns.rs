use super::price_bar::PriceBar;
use crate::domain::errors::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Day-over-day return derived from two consecutive closes.
///
/// Carries the bar's date, open and close so later stages can build
/// augmented rows without re-joining against the price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub log_return: f64,
    pub simple_return: f64,
}

/// Ordered return sequence for one symbol. Length is always `bars - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Derive log and simple returns from close prices.
    ///
    /// The first bar has no predecessor and yields no point.
    pub fn from_bars(bars: &[PriceBar]) -> Result<Self, DataError> {
        if bars.len() < 2 {
            return Err(DataError::InsufficientData {
                what: "price bars",
                required: 2,
                actual: bars.len(),
            });
        }

        let points = bars
            .windows(2)
            .map(|pair| {
                let (prev, curr) = (&pair[0], &pair[1]);
                let ratio = curr.close / prev.close;
                ReturnPoint {
                    date: curr.date,
                    open: curr.open,
                    close: curr.close,
                    log_return: ratio.ln(),
                    simple_return: ratio - 1.0,
                }
            })
            .collect();

        Ok(Self { points })
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn log_returns(&self) -> Vec<f64> {
        log_returns(&self.points)
    }

    /// Partition into a contiguous training prefix of
    /// `floor((1 - test_fraction) * N)` points and the remaining test suffix.
    pub fn split(&self, test_fraction: f64) -> Result<Split<'_>, DataError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DataError::InvalidSplit {
                reason: format!("test fraction must be in (0, 1), got {}", test_fraction),
            });
        }

        let n = self.points.len();
        let train_len = ((1.0 - test_fraction) * n as f64).floor() as usize;
        if train_len == 0 {
            return Err(DataError::InsufficientData {
                what: "training returns",
                required: 1,
                actual: 0,
            });
        }
        if train_len >= n {
            return Err(DataError::InvalidSplit {
                reason: format!(
                    "{} points with test fraction {} leaves an empty side",
                    n, test_fraction
                ),
            });
        }

        let (train, test) = self.points.split_at(train_len);
        Ok(Split { train, test })
    }
}

/// Time-ordered train/test partition of a return series.
#[derive(Debug, Clone, Copy)]
pub struct Split<'a> {
    train: &'a [ReturnPoint],
    test: &'a [ReturnPoint],
}

impl<'a> Split<'a> {
    pub fn train(&self) -> &'a [ReturnPoint] {
        self.train
    }

    pub fn test(&self) -> &'a [ReturnPoint] {
        self.test
    }

    pub fn train_log_returns(&self) -> Vec<f64> {
        log_returns(self.train)
    }

    pub fn test_log_returns(&self) -> Vec<f64> {
        log_returns(self.test)
    }
}

fn log_returns(points: &[ReturnPoint]) -> Vec<f64> {
    points.iter().map(|p| p.log_return).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(start + chrono::Days::new(i as u64), c - 0.5, c))
            .collect()
    }

    #[test]
    fn test_returns_length_and_consistency() {
        let series = ReturnSeries::from_bars(&bars(&[100.0, 101.0, 99.5, 102.0, 102.0])).unwrap();
        assert_eq!(series.len(), 4);

        for p in series.points() {
            assert!((p.log_return - (1.0 + p.simple_return).ln()).abs() < 1e-12);
        }

        let first = series.points()[0];
        assert!((first.simple_return - 0.01).abs() < 1e-12);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.open, 100.5);
        assert_eq!(series.points()[3].log_return, 0.0);
    }

    #[test]
    fn test_insufficient_bars() {
        let err = ReturnSeries::from_bars(&bars(&[100.0])).unwrap_err();
        assert!(matches!(
            err,
            DataError::InsufficientData {
                required: 2,
                actual: 1,
                ..
            }
        ));
        assert!(ReturnSeries::from_bars(&[]).is_err());
    }

    #[test]
    fn test_split_is_ordered_and_disjoint() {
        let closes: Vec<f64> = (0..101).map(|i| 100.0 + i as f64).collect();
        let series = ReturnSeries::from_bars(&bars(&closes)).unwrap();
        let n = series.len();

        for fraction in [0.1, 0.2, 0.25, 0.3, 0.5] {
            let split = series.split(fraction).unwrap();
            let expected_train = ((1.0 - fraction) * n as f64).floor() as usize;
            assert_eq!(split.train().len(), expected_train);
            assert_eq!(split.train().len() + split.test().len(), n);

            let rejoined: Vec<ReturnPoint> = split
                .train()
                .iter()
                .chain(split.test().iter())
                .copied()
                .collect();
            assert_eq!(rejoined.as_slice(), series.points());
            assert!(split.train().last().unwrap().date < split.test()[0].date);
        }
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let series = ReturnSeries::from_bars(&bars(&[1.0, 2.0, 3.0])).unwrap();
        assert!(series.split(0.0).is_err());
        assert!(series.split(1.0).is_err());
        assert!(matches!(series.split(f64::NAN), Err(DataError::InvalidSplit { .. })));
    }

    #[test]
    fn test_empty_training_side_is_insufficient() {
        // 2 points * 0.6 -> train of 0
        let series = ReturnSeries::from_bars(&bars(&[1.0, 2.0, 3.0])).unwrap();
        assert!(matches!(
            series.split(0.6),
            Err(DataError::InsufficientData {
                what: "training returns",
                actual: 0,
                ..
            })
        ));

        let single = ReturnSeries::from_bars(&bars(&[1.0, 2.0])).unwrap();
        assert!(matches!(
            single.split(0.2),
            Err(DataError::InsufficientData { .. })
        ));
    }
}
