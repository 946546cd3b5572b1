use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use regime_trader::application::backtesting::{ParallelRegimeRunner, RegimePipeline, RegimeReporter};
use regime_trader::config::{AppConfig, DataSource, parse_symbols};
use regime_trader::domain::regime::CovarianceMode;
use regime_trader::infrastructure::{ServiceFactory, SyntheticMarketDataService};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Gaussian HMM regime detection and regime-driven backtests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit, decode and backtest every configured symbol
    Run {
        /// TOML configuration file (environment variables are used otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Symbol(s) to analyse, comma separated, optionally TICKER=Name
        #[arg(short, long)]
        symbols: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Data source: yahoo, csv or synthetic
        #[arg(long)]
        source: Option<String>,

        /// Directory with <ticker>.csv files for the csv source
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Covariance mode: full or diag
        #[arg(long)]
        covariance: Option<String>,

        /// Fraction of returns held out for decoding and trading
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Seed for model initialization
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum EM iterations
        #[arg(long)]
        max_iter: Option<usize>,

        /// Directory for JSON and CSV reports
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write synthetic planted-regime price files usable by the csv source
    Generate {
        /// Symbol(s) to generate, comma separated
        #[arg(short, long, default_value = "SYN")]
        symbols: String,

        #[arg(long, default_value = "2010-01-01")]
        start: String,

        #[arg(long, default_value = "2023-12-31")]
        end: String,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: PathBuf,
    },
}

fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Setup logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            symbols,
            start,
            end,
            source,
            csv_dir,
            covariance,
            test_fraction,
            seed,
            max_iter,
            output,
        } => {
            let mut app = match config {
                Some(path) => AppConfig::from_file(&path)?,
                None => AppConfig::from_env()?,
            };

            if let Some(raw) = symbols {
                app.data.symbols = parse_symbols(&raw)?;
            }
            if let Some(raw) = start {
                app.data.start_date = parse_date(&raw)?;
            }
            if let Some(raw) = end {
                app.data.end_date = parse_date(&raw)?;
            }
            if let Some(raw) = source {
                app.data.source = DataSource::from_str(&raw)?;
            }
            if let Some(dir) = csv_dir {
                app.data.csv_dir = dir;
            }
            if let Some(raw) = covariance {
                app.pipeline.covariance_mode = CovarianceMode::from_str(&raw)?;
            }
            if let Some(f) = test_fraction {
                app.pipeline.test_fraction = f;
            }
            if let Some(s) = seed {
                app.pipeline.seed = s;
            }
            if let Some(n) = max_iter {
                app.pipeline.max_iterations = n;
            }
            if output.is_some() {
                app.output_dir = output;
            }
            app.validate().context("Invalid configuration")?;

            info!(
                "Running {} symbol(s) from {} ({} to {})",
                app.data.symbols.len(),
                app.data.source,
                app.data.start_date,
                app.data.end_date
            );

            let service = ServiceFactory::create_market_data_service(&app.data, app.pipeline.seed);
            let runner =
                ParallelRegimeRunner::new(service, RegimePipeline::new(app.pipeline.clone()));
            let results = runner
                .run_parallel(&app.data.symbols, app.data.start_date, app.data.end_date)
                .await;

            for report in results.iter().filter_map(|r| r.result.as_ref().ok()) {
                RegimeReporter::print_model_summary(report);
            }
            RegimeReporter::print_summary(&results);

            if let Some(dir) = &app.output_dir {
                let reporter = RegimeReporter::new(dir)?;
                let desc = format!(
                    "K={} covariance={} test_fraction={} seed={} source={}",
                    app.pipeline.n_states,
                    app.pipeline.covariance_mode,
                    app.pipeline.test_fraction,
                    app.pipeline.seed,
                    app.data.source
                );
                let path = reporter.write_json(&results, &desc)?;
                println!("Report saved to: {}", path.display());
                for report in results.iter().filter_map(|r| r.result.as_ref().ok()) {
                    let (labeled, performance) = reporter.write_csv(report)?;
                    info!(
                        "Chart data for {}: {}, {}",
                        report.symbol,
                        labeled.display(),
                        performance.display()
                    );
                }
            }

            if results.iter().all(|r| !r.is_ok()) {
                anyhow::bail!("All {} symbol(s) failed", results.len());
            }
        }
        Commands::Generate {
            symbols,
            start,
            end,
            seed,
            output,
        } => {
            let start = parse_date(&start)?;
            let end = parse_date(&end)?;
            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;

            let generator = SyntheticMarketDataService::new(seed);
            for symbol in parse_symbols(&symbols)? {
                let series = generator.generate(&symbol.ticker, start, end);
                let path = output.join(format!("{}.csv", symbol.ticker));
                let mut wtr = csv::Writer::from_path(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                for bar in &series.bars {
                    wtr.serialize(bar)?;
                }
                wtr.flush()?;
                println!("Wrote {} bars to {}", series.bars.len(), path.display());
            }
        }
    }

    Ok(())
}
