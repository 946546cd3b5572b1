use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regime_trader::domain::market::{PriceBar, ReturnSeries};
use regime_trader::domain::performance::{PerformanceAccountant, PerformanceSummary};
use regime_trader::domain::regime::SemanticLabel;
use regime_trader::domain::trading::{Action, PolicyEngine, TradeLogEntry};

fn random_bars(rng: &mut StdRng, n: usize) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let mut close = 100.0;
    (0..n)
        .map(|i| {
            let open = close * (1.0 + rng.random_range(-0.005..0.005));
            close *= 1.0 + rng.random_range(-0.03..0.03);
            PriceBar::new(start + Days::new(i as u64), open, close)
        })
        .collect()
}

#[test]
fn test_return_series_properties() {
    let mut rng = StdRng::seed_from_u64(17);
    for n in [2, 3, 10, 257] {
        let bars = random_bars(&mut rng, n);
        let series = ReturnSeries::from_bars(&bars).unwrap();
        assert_eq!(series.len(), n - 1);
        for p in series.points() {
            assert!((p.log_return - (1.0 + p.simple_return).ln()).abs() < 1e-12);
        }

        if n < 10 {
            continue;
        }
        for fraction in [0.1, 0.2, 0.5] {
            let split = series.split(fraction).unwrap();
            assert_eq!(
                split.train().len(),
                ((1.0 - fraction) * series.len() as f64).floor() as usize
            );
            let rejoined: Vec<_> = split.train().iter().chain(split.test()).copied().collect();
            assert_eq!(rejoined.as_slice(), series.points());
        }
    }
}

#[test]
fn test_full_exposure_hold_tracks_buy_and_hold() {
    let mut rng = StdRng::seed_from_u64(99);
    let bars = random_bars(&mut rng, 300);
    let log: Vec<TradeLogEntry> = bars
        .iter()
        .map(|bar| TradeLogEntry {
            date: bar.date,
            action: Action::Hold,
            target_exposure: 1.0,
            open_price: bar.open,
            regime: SemanticLabel::Bullish,
        })
        .collect();

    let records = PerformanceAccountant::new().account(&log);
    for r in &records {
        let tolerance = 1e-9 * (1.0 + r.buy_and_hold_return.abs());
        assert!((r.cumulative_compounded_return - r.buy_and_hold_return).abs() < tolerance);
    }

    let summary = PerformanceSummary::from_records(&records);
    assert_eq!(summary.total_trades, 0);
    assert!(summary.excess_return.abs() < 1e-9);
    assert!((summary.average_exposure - 1.0).abs() < 1e-12);
}

#[test]
fn test_cumulative_columns_are_consistent() {
    let mut rng = StdRng::seed_from_u64(5);
    let bars = random_bars(&mut rng, 120);
    let engine = PolicyEngine::new();

    let labels: Vec<SemanticLabel> = (0..bars.len())
        .map(|_| SemanticLabel::ALL[rng.random_range(0..3)])
        .collect();
    let log: Vec<TradeLogEntry> = labels
        .windows(2)
        .zip(&bars[1..])
        .map(|(pair, bar)| {
            let decision = engine.step(pair[0], pair[1]);
            TradeLogEntry {
                date: bar.date,
                action: decision.action,
                target_exposure: decision.exposure,
                open_price: bar.open,
                regime: pair[1],
            }
        })
        .collect();

    let records = PerformanceAccountant::new().account(&log);
    let mut wealth = 1.0;
    let mut simple = 0.0;
    for r in &records {
        assert!([0.0, 0.5, 1.0].contains(&r.target_exposure));
        wealth *= 1.0 + r.portfolio_return;
        simple += r.portfolio_return;
        assert!((r.cumulative_compounded_return - (wealth - 1.0)).abs() < 1e-12);
        assert!((r.cumulative_simple_return - simple).abs() < 1e-12);
        assert!(r.portfolio_return.abs() <= r.open_price_pct_change.abs() + 1e-15);
        assert!((r.buy_and_hold_return - (r.open_price / log[0].open_price - 1.0)).abs() < 1e-12);
    }
}
