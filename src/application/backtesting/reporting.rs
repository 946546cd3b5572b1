use super::parallel_runner::SymbolRunResult;
use super::pipeline::RegimeRunReport;
use crate::domain::regime::SemanticLabel;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegimeBatchReport {
    pub timestamp: DateTime<Utc>,
    pub configuration: String,
    pub results: Vec<RegimeResultEntry>,
    pub failures: Vec<FailureEntry>,
}

/// Per-symbol headline numbers; percentages rounded to 2 dp.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegimeResultEntry {
    pub symbol: String,
    pub name: String,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub states: Vec<StateEntry>,
    pub transition_matrix: Vec<Vec<f64>>,
    pub aic: f64,
    pub bic: f64,
    pub converged: bool,
    pub test_log_likelihood: f64,
    pub strategy_return_pct: Decimal,
    pub simple_return_pct: Decimal,
    pub buy_and_hold_pct: Decimal,
    pub excess_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: f64,
    pub trade_count: usize,
    pub average_exposure: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateEntry {
    pub state: usize,
    pub label: Option<SemanticLabel>,
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailureEntry {
    pub symbol: String,
    pub kind: String,
    pub error: String,
}

/// Flat CSV row of the performance table.
#[derive(Debug, Serialize)]
struct PerformanceCsvRow {
    date: NaiveDate,
    regime: SemanticLabel,
    action: String,
    target_exposure: f64,
    open_price: f64,
    open_price_pct_change: f64,
    portfolio_return: f64,
    cumulative_compounded_return: f64,
    cumulative_simple_return: f64,
    buy_and_hold_return: f64,
}

fn pct(fraction: f64) -> Decimal {
    Decimal::from_f64_retain(fraction * 100.0)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}

impl RegimeResultEntry {
    pub fn from_report(report: &RegimeRunReport) -> Self {
        let s = &report.summary;
        Self {
            symbol: report.symbol.ticker.clone(),
            name: report.symbol.name.clone(),
            test_start: report.test_start,
            test_end: report.test_end,
            states: report
                .model
                .states
                .iter()
                .map(|st| StateEntry {
                    state: st.state,
                    label: report.mapping.label_for(st.state),
                    mean: st.mean,
                    variance: st.variance,
                    skewness: st.sample_skewness,
                    kurtosis: st.sample_kurtosis,
                })
                .collect(),
            transition_matrix: report.model.transition_matrix.clone(),
            aic: report.model.aic,
            bic: report.model.bic,
            converged: report.model.converged,
            test_log_likelihood: report.test_log_likelihood,
            strategy_return_pct: pct(s.compounded_return),
            simple_return_pct: pct(s.simple_return),
            buy_and_hold_pct: pct(s.buy_and_hold_return),
            excess_return_pct: pct(s.excess_return),
            max_drawdown_pct: pct(s.max_drawdown),
            sharpe_ratio: s.sharpe_ratio,
            trade_count: s.total_trades,
            average_exposure: s.average_exposure,
        }
    }
}

/// Console, JSON and CSV output for batch runs.
pub struct RegimeReporter {
    output_dir: PathBuf,
}

impl RegimeReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let path = output_dir.into();
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create output directory {}", path.display()))?;
        Ok(Self { output_dir: path })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn build_report(results: &[SymbolRunResult], config_desc: &str) -> RegimeBatchReport {
        let mut entries = Vec::new();
        let mut failures = Vec::new();
        for r in results {
            match &r.result {
                Ok(report) => entries.push(RegimeResultEntry::from_report(report)),
                Err(e) => failures.push(FailureEntry {
                    symbol: r.symbol.ticker.clone(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                }),
            }
        }
        RegimeBatchReport {
            timestamp: Utc::now(),
            configuration: config_desc.to_string(),
            results: entries,
            failures,
        }
    }

    /// Write the batch JSON report and return its path.
    pub fn write_json(&self, results: &[SymbolRunResult], config_desc: &str) -> Result<PathBuf> {
        let report = Self::build_report(results, config_desc);
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        let filename = format!(
            "regime_report_{}.json",
            report.timestamp.format("%Y%m%d_%H%M%S")
        );
        let path = self.output_dir.join(filename);
        fs::write(&path, json)
            .with_context(|| format!("Failed to write report file {}", path.display()))?;

        info!("Report saved to: {}", path.display());
        Ok(path)
    }

    /// Write `<ticker>_labeled.csv` and `<ticker>_performance.csv` for charting.
    pub fn write_csv(&self, report: &RegimeRunReport) -> Result<(PathBuf, PathBuf)> {
        let stem = file_stem(&report.symbol.ticker);

        let labeled_path = self.output_dir.join(format!("{}_labeled.csv", stem));
        let mut wtr = csv::Writer::from_path(&labeled_path)
            .with_context(|| format!("Failed to create {}", labeled_path.display()))?;
        for row in &report.labeled {
            wtr.serialize(row)?;
        }
        wtr.flush()?;

        let performance_path = self.output_dir.join(format!("{}_performance.csv", stem));
        let mut wtr = csv::Writer::from_path(&performance_path)
            .with_context(|| format!("Failed to create {}", performance_path.display()))?;
        for r in &report.performance {
            wtr.serialize(PerformanceCsvRow {
                date: r.date,
                regime: r.regime,
                action: r.action.to_string(),
                target_exposure: r.target_exposure,
                open_price: r.open_price,
                open_price_pct_change: r.open_price_pct_change,
                portfolio_return: r.portfolio_return,
                cumulative_compounded_return: r.cumulative_compounded_return,
                cumulative_simple_return: r.cumulative_simple_return,
                buy_and_hold_return: r.buy_and_hold_return,
            })?;
        }
        wtr.flush()?;

        Ok((labeled_path, performance_path))
    }

    pub fn print_model_summary(report: &RegimeRunReport) {
        let model = &report.model;
        println!("\n{}", "=".repeat(80));
        println!("{}", report.symbol);
        println!("{}", "=".repeat(80));
        println!(
            "Train {} / test {} returns, test period {} to {}",
            report.train_len, report.test_len, report.test_start, report.test_end
        );
        println!(
            "logL(train) = {:.2}  logL(test) = {:.2}  AIC = {:.2}  BIC = {:.2}  params = {}{}",
            model.train_log_likelihood,
            report.test_log_likelihood,
            model.aic,
            model.bic,
            model.free_parameters,
            if model.converged { "" } else { "  (not converged)" }
        );
        println!(
            "{:<6} | {:<8} | {:>10} | {:>10} | {:>8} | {:>8}",
            "State", "Label", "Mean", "Std", "Skew", "Kurt"
        );
        println!("{}", "-".repeat(80));
        for st in &model.states {
            let label = report
                .mapping
                .label_for(st.state)
                .map_or_else(|| "-".to_string(), |l| l.to_string());
            println!(
                "{:<6} | {:<8} | {:>10.6} | {:>10.6} | {:>8.3} | {:>8.3}",
                st.state, label, st.mean, st.std_dev, st.sample_skewness, st.sample_kurtosis
            );
        }
        println!("Transition matrix:");
        for row in &model.transition_matrix {
            let cells: Vec<String> = row.iter().map(|p| format!("{:.4}", p)).collect();
            println!("  [{}]", cells.join(", "));
        }
    }

    pub fn print_summary(results: &[SymbolRunResult]) {
        if results.is_empty() {
            println!("No results to report.");
            return;
        }

        println!("\n{}", "=".repeat(110));
        println!("REGIME STRATEGY SUMMARY");
        println!("{}", "=".repeat(110));
        println!(
            "{:<8} | {:>9} | {:>9} | {:>9} | {:>9} | {:>7} | {:>8} | {:>6} | {:>10}",
            "Symbol", "Strategy%", "Simple%", "B&H%", "Excess%", "Sharpe", "DD%", "Trades", "Exposure"
        );
        println!("{}", "-".repeat(110));

        let mut failures = Vec::new();
        for r in results {
            match &r.result {
                Ok(report) => {
                    let entry = RegimeResultEntry::from_report(report);
                    println!(
                        "{:<8} | {:>8.2}% | {:>8.2}% | {:>8.2}% | {:>8.2}% | {:>7.2} | {:>7.2}% | {:>6} | {:>10.2}",
                        entry.symbol,
                        entry.strategy_return_pct,
                        entry.simple_return_pct,
                        entry.buy_and_hold_pct,
                        entry.excess_return_pct,
                        entry.sharpe_ratio,
                        entry.max_drawdown_pct,
                        entry.trade_count,
                        entry.average_exposure
                    );
                }
                Err(e) => failures.push(format!("  {} [{}]: {}", r.symbol.ticker, e.kind(), e)),
            }
        }
        println!("{}", "=".repeat(110));

        if !failures.is_empty() {
            println!("\nFailed symbols:");
            for f in &failures {
                println!("{}", f);
            }
        }
    }
}

/// File-system friendly name for a ticker such as `^GSPC`.
fn file_stem(ticker: &str) -> String {
    let stem: String = ticker
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
        .collect();
    if stem.is_empty() {
        "symbol".to_string()
    } else {
        stem
    }
}
