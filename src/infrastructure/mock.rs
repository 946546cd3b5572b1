use crate::domain::errors::DataError;
use crate::domain::market::PriceBar;
use crate::domain::ports::MarketDataService;
use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashSet;
use tracing::debug;

/// Daily log-return distribution of one planted regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantedRegime {
    pub mean: f64,
    pub std_dev: f64,
}

impl PlantedRegime {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

/// Generated bars together with the regime index behind each bar's return.
///
/// `regimes[0]` belongs to the first bar, which has no return.
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub bars: Vec<PriceBar>,
    pub regimes: Vec<usize>,
}

/// Seeded price generator with planted Gaussian regimes.
///
/// Trading days (Monday to Friday) are grouped into blocks of `block_len`
/// days; each block draws its log-returns from one regime. The regime order
/// follows `schedule` when given, otherwise each block picks a regime
/// different from the previous one. Opens equal the previous close.
#[derive(Debug, Clone)]
pub struct SyntheticMarketDataService {
    seed: u64,
    regimes: Vec<PlantedRegime>,
    block_len: usize,
    schedule: Option<Vec<usize>>,
    start_price: f64,
    unavailable: HashSet<String>,
}

impl SyntheticMarketDataService {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            regimes: vec![
                PlantedRegime::new(-0.0015, 0.022),
                PlantedRegime::new(0.0002, 0.010),
                PlantedRegime::new(0.0010, 0.006),
            ],
            block_len: 60,
            schedule: None,
            start_price: 1000.0,
            unavailable: HashSet::new(),
        }
    }

    pub fn with_regimes(mut self, regimes: Vec<PlantedRegime>) -> Self {
        self.regimes = regimes;
        self
    }

    pub fn with_block_len(mut self, block_len: usize) -> Self {
        self.block_len = block_len.max(1);
        self
    }

    /// Cycle through these regime indices, one per block.
    pub fn with_schedule(mut self, schedule: Vec<usize>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Make `fetch_prices` fail for `symbol`.
    pub fn with_unavailable(mut self, symbol: impl Into<String>) -> Self {
        self.unavailable.insert(symbol.into());
        self
    }

    pub fn regimes(&self) -> &[PlantedRegime] {
        &self.regimes
    }

    /// Deterministic per-symbol series over the trading days in `[start, end]`.
    pub fn generate(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> SyntheticSeries {
        let mut rng = StdRng::seed_from_u64(symbol_seed(self.seed, symbol));
        let densities: Vec<Normal> = self
            .regimes
            .iter()
            .filter_map(|r| Normal::new(r.mean, r.std_dev).ok())
            .collect();
        if densities.is_empty() {
            return SyntheticSeries {
                bars: Vec::new(),
                regimes: Vec::new(),
            };
        }

        let mut bars = Vec::new();
        let mut regimes = Vec::new();
        let mut block_regime = 0;
        let mut close = self.start_price;

        for (day, date) in trading_days(start, end).enumerate() {
            if day % self.block_len == 0 {
                let block = day / self.block_len;
                block_regime = match &self.schedule {
                    Some(schedule) if !schedule.is_empty() => {
                        schedule[block % schedule.len()] % densities.len()
                    }
                    _ if block == 0 || densities.len() == 1 => rng.random_range(0..densities.len()),
                    _ => {
                        let shift = rng.random_range(1..densities.len());
                        (block_regime + shift) % densities.len()
                    }
                };
            }

            let open = close;
            if day > 0 {
                let u: f64 = rng.random_range(f64::EPSILON..1.0);
                close *= densities[block_regime].inverse_cdf(u).exp();
            }
            bars.push(PriceBar::new(date, open, close));
            regimes.push(block_regime);
        }

        debug!(
            "SyntheticMarketDataService: Generated {} bars for {}",
            bars.len(),
            symbol
        );
        SyntheticSeries { bars, regimes }
    }
}

impl Default for SyntheticMarketDataService {
    fn default() -> Self {
        Self::new(42)
    }
}

#[async_trait]
impl MarketDataService for SyntheticMarketDataService {
    async fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        if self.unavailable.contains(symbol) {
            return Err(DataError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "symbol marked unavailable".to_string(),
            });
        }
        let bars = self.generate(symbol, start, end).bars;
        if bars.is_empty() {
            return Err(DataError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no trading days between {} and {}", start, end),
            });
        }
        Ok(bars)
    }
}

fn symbol_seed(seed: u64, symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

fn trading_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), |d| d.checked_add_days(Days::new(1)))
        .take_while(move |d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_generate_is_deterministic_per_symbol() {
        let service = SyntheticMarketDataService::new(7);
        let a = service.generate("^GSPC", date(2020, 1, 1), date(2020, 12, 31));
        let b = service.generate("^GSPC", date(2020, 1, 1), date(2020, 12, 31));
        let c = service.generate("^RUT", date(2020, 1, 1), date(2020, 12, 31));

        assert_eq!(a.bars, b.bars);
        assert_ne!(a.bars, c.bars);
        // 2020 has 262 weekdays
        assert_eq!(a.bars.len(), 262);
        assert!(
            a.bars
                .iter()
                .all(|bar| !matches!(bar.date.weekday(), Weekday::Sat | Weekday::Sun))
        );
    }

    #[test]
    fn test_opens_follow_previous_close() {
        let service = SyntheticMarketDataService::new(1);
        let series = service.generate("X", date(2021, 1, 1), date(2021, 3, 31));
        for pair in series.bars.windows(2) {
            assert_eq!(pair[1].open, pair[0].close);
            assert!(pair[1].close > 0.0);
        }
    }

    #[test]
    fn test_schedule_and_random_blocks() {
        let scheduled = SyntheticMarketDataService::new(3)
            .with_block_len(5)
            .with_schedule(vec![2, 0]);
        let series = scheduled.generate("X", date(2021, 1, 4), date(2021, 2, 26));
        assert_eq!(&series.regimes[..10], &[2, 2, 2, 2, 2, 0, 0, 0, 0, 0]);

        let random = SyntheticMarketDataService::new(3).with_block_len(5);
        let series = random.generate("X", date(2021, 1, 4), date(2021, 6, 30));
        for block in series.regimes.chunks(5).collect::<Vec<_>>().windows(2) {
            assert_ne!(block[0][0], block[1][0]);
        }
    }

    #[test]
    fn test_unavailable_symbol() {
        let service = SyntheticMarketDataService::default().with_unavailable("^DJI");
        let err = tokio_test::block_on(service.fetch_prices(
            "^DJI",
            date(2020, 1, 1),
            date(2020, 6, 30),
        ))
        .unwrap_err();
        assert!(matches!(err, DataError::DataUnavailable { .. }));

        let bars = tokio_test::block_on(service.fetch_prices(
            "^GSPC",
            date(2020, 1, 1),
            date(2020, 6, 30),
        ))
        .unwrap();
        assert_eq!(bars.first().map(|b| b.date), Some(date(2020, 1, 1)));
    }
}
