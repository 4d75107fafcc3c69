//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::batch::{BatchReport, parse_symbols, run_loaded, select_symbols};
use crate::domain::config::{AppConfig, DataConfig, DataSource};
use crate::domain::error::LagcastError;
use crate::ports::data_port::PriceLoader;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "lagcast",
    about = "Lag-window price forecasting and threshold backtesting"
)]
pub struct Cli {
    /// Log at debug level, including every simulated trade decision
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train, evaluate and backtest every configured symbol
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Output directory, overrides [report] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated symbols, overrides [data] symbols
        #[arg(long)]
        symbols: Option<String>,
        /// Run symbols in parallel
        #[arg(long)]
        parallel: bool,
    },
    /// Check a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "lagcast=debug" } else { "lagcast=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            output,
            symbols,
            parallel,
        } => run_forecast(&config, output.as_deref(), symbols.as_deref(), parallel),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn fail(err: LagcastError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<AppConfig, LagcastError> {
    info!("loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    AppConfig::from_config(&adapter)
}

pub fn open_loader(data: &DataConfig) -> Result<Box<dyn PriceLoader>, LagcastError> {
    match data.source {
        DataSource::Csv => Ok(Box::new(CsvAdapter::new(data.path.clone()))),
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let path = data.path.to_string_lossy();
            Ok(Box::new(SqliteAdapter::open(&path, data.pool_size)?))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite => Err(LagcastError::invalid(
            "data",
            "source",
            "built without the sqlite feature",
        )),
    }
}

fn run_forecast(
    config_path: &Path,
    output: Option<&Path>,
    symbols_override: Option<&str>,
    parallel: bool,
) -> ExitCode {
    let mut app = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    if let Some(raw) = symbols_override {
        match parse_symbols(raw) {
            Ok(list) => app.data.symbols = Some(list),
            Err(e) => return fail(LagcastError::invalid("cli", "symbols", e.to_string())),
        }
    }
    if parallel {
        app.run.parallel = true;
    }
    if let Some(dir) = output {
        app.report.output_dir = dir.to_path_buf();
    }

    let loader = match open_loader(&app.data) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };
    let mut loaded = match loader.load_prices(&app.data.table) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };

    if let Some(wanted) = &app.data.symbols {
        loaded = select_symbols(loaded, wanted);
    }

    if loaded.is_empty() {
        eprintln!("error: no symbols with price data to run");
        return ExitCode::from(5);
    }

    let report = match run_loaded(loaded, &app.run, &app.run.model) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_summary(&report);

    let writer = CsvReportAdapter::new(&app.report);
    match writer.write_report(&report, &app.report.output_dir) {
        Ok(paths) => {
            eprintln!(
                "\nReport written to: {} ({} files)",
                app.report.output_dir.display(),
                paths.len()
            );
        }
        Err(e) => return fail(e),
    }

    if report.completed_count() == 0 {
        eprintln!("error: no symbol completed");
        return ExitCode::from(5);
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let app = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let p = &app.run.pipeline;
    let t = &app.run.trading;
    println!("Configuration OK");
    println!(
        "  Data:       {:?} {} (table {})",
        app.data.source,
        app.data.path.display(),
        app.data.table
    );
    println!("  Estimator:  {}", app.run.model.kind);
    println!(
        "  Pipeline:   lag_days={} test_fraction={} split={} forecast_periods={} seed={}",
        p.lag_days, p.test_fraction, p.split_mode, p.forecast_periods, p.estimator_seed
    );
    println!(
        "  Backtest:   initial_cash={:.2} trade_size={} threshold={} risk_free_rate={}",
        t.initial_cash, t.trade_size, t.threshold, t.risk_free_rate
    );
    println!("  Output:     {}", app.report.output_dir.display());
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let adapter = match FileConfigAdapter::from_file(config_path) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    let data = match DataConfig::from_config(&adapter) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let loader = match open_loader(&data) {
        Ok(l) => l,
        Err(e) => return fail(e),
    };

    match loader.list_symbols(&data.table) {
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{symbol}");
            }
            eprintln!("{} symbols", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "n/a".to_string(),
    }
}

pub fn print_summary(report: &BatchReport) {
    println!(
        "{:<10} {:>10} {:>10} {:>8} {:>10} {:>10} {:>8} {:>7}",
        "Symbol", "RMSE", "MAE", "R2", "Return%", "MaxDD%", "Sharpe", "Trades"
    );
    for outcome in &report.outcomes {
        match outcome.report() {
            Some(r) => {
                let m = &r.record;
                println!(
                    "{:<10} {:>10.4} {:>10.4} {:>8} {:>10} {:>10} {:>8} {:>7}",
                    m.symbol,
                    m.rmse,
                    m.mae,
                    fmt_opt(m.r2, 3),
                    fmt_opt(m.total_return_pct, 2),
                    fmt_opt(m.max_drawdown_pct, 2),
                    fmt_opt(m.sharpe_ratio, 2),
                    m.trades,
                );
            }
            None => println!(
                "{:<10} {} ({})",
                outcome.symbol(),
                outcome.status(),
                outcome.reason().unwrap_or("")
            ),
        }
    }
    println!(
        "\n{} completed, {} skipped, {} failed",
        report.completed_count(),
        report.skipped_count(),
        report.failed_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "lagcast",
            "run",
            "--config",
            "c.ini",
            "--symbols",
            "BHP,CBA",
            "--parallel",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Run {
                config,
                symbols,
                parallel,
                output,
            } => {
                assert_eq!(config, PathBuf::from("c.ini"));
                assert_eq!(symbols.as_deref(), Some("BHP,CBA"));
                assert!(parallel);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_validate_and_list() {
        let cli = Cli::try_parse_from(["lagcast", "validate", "-c", "x.ini"]).unwrap();
        assert!(matches!(cli.command, Command::Validate { .. }));
        let cli = Cli::try_parse_from(["lagcast", "list-symbols", "-c", "x.ini"]).unwrap();
        assert!(matches!(cli.command, Command::ListSymbols { .. }));
    }

    #[test]
    fn run_requires_config() {
        assert!(Cli::try_parse_from(["lagcast", "run"]).is_err());
    }

    #[test]
    fn fmt_opt_marks_undefined() {
        assert_eq!(fmt_opt(None, 2), "n/a");
        assert_eq!(fmt_opt(Some(1.234), 2), "1.23");
    }
}
