//! CLI definition and dispatch.
//!
//! Every command returns an [`ExitCode`]; failures are printed to stderr and
//! mapped through `From<&FundtraderError>`.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::{sibling_path, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult, Backtester};
use crate::domain::config_validation::{
    build_backtest_config, build_strategy_params, configured_codes, data_source, strategy_name,
    validate_backtest_config, validate_data_config, validate_strategy_config, DataSource,
};
use crate::domain::error::FundtraderError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::strategy::{Strategy, StrategyRegistry};
use crate::domain::universe::{parse_codes, SkipReason};
use crate::ports::config_port::ConfigPort;
use crate::ports::fundamental_port::FundamentalProvider;
use crate::ports::price_port::PriceProvider;
use crate::ports::report_port::ReportPort;

const DEFAULT_OUTPUT: &str = "equity.csv";

#[derive(Parser, Debug)]
#[command(name = "fundtrader", about = "Fundamental-data portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Registry name, overriding [strategy] name
        #[arg(short, long)]
        strategy: Option<String>,
        /// Comma-separated codes, overriding [backtest] codes
        #[arg(long)]
        codes: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List the built-in strategies and their parameters
    Strategies,
    /// List the instruments held by the configured data source
    ListCodes {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show price and fundamental coverage for code(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        codes: Option<String>,
    },
    /// Validate a configuration file without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Copy a CSV data directory into the configured SQLite database
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of `<CODE>.csv` and `<CODE>_fundamentals.csv` files
        #[arg(long)]
        from: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            codes,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, strategy.as_deref(), codes.as_deref())
            } else {
                run_backtest(&config, strategy.as_deref(), codes.as_deref(), output.as_ref())
            }
        }
        Command::Strategies => run_strategies(),
        Command::ListCodes { config } => run_list_codes(&config),
        Command::Info { config, codes } => run_info(&config, codes.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Import { config, from } => run_import(&config, &from),
    }
}

/// Widest window every provider formats as a plain `YYYY-MM-DD` date.
fn all_dates() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN),
        NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX),
    )
}

fn fail(err: FundtraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Concrete data source chosen by `[data] source`.
pub enum DataAdapter {
    Csv(CsvAdapter),
    #[cfg(feature = "sqlite")]
    Sqlite(crate::adapters::sqlite_adapter::SqliteAdapter),
}

impl DataAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FundtraderError> {
        validate_data_config(config)?;
        match data_source(config)? {
            DataSource::Csv => {
                let path = config
                    .get_string("data", "path")
                    .ok_or_else(|| FundtraderError::missing("data", "path"))?;
                Ok(DataAdapter::Csv(CsvAdapter::new(PathBuf::from(path))))
            }
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite => {
                use crate::adapters::sqlite_adapter::SqliteAdapter;
                let adapter = SqliteAdapter::from_config(config)?;
                adapter.initialize_schema()?;
                Ok(DataAdapter::Sqlite(adapter))
            }
            #[cfg(not(feature = "sqlite"))]
            DataSource::Sqlite => Err(FundtraderError::invalid(
                "data",
                "source",
                "sqlite support was not compiled in",
            )),
        }
    }

    pub fn prices(&self) -> &dyn PriceProvider {
        match self {
            DataAdapter::Csv(a) => a,
            #[cfg(feature = "sqlite")]
            DataAdapter::Sqlite(a) => a,
        }
    }

    pub fn fundamentals(&self) -> &dyn FundamentalProvider {
        match self {
            DataAdapter::Csv(a) => a,
            #[cfg(feature = "sqlite")]
            DataAdapter::Sqlite(a) => a,
        }
    }
}

/// `--codes` when given, else the configured list.
pub fn resolve_codes(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, FundtraderError> {
    match code_override {
        Some(raw) => parse_codes(raw)
            .map_err(|e| FundtraderError::invalid("backtest", "codes", e.to_string())),
        None => configured_codes(config),
    }
}

/// Build the named strategy (`--strategy` wins over `[strategy] name`) with
/// its parameters read from `[strategy]`.
pub fn build_strategy(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
    strategy_override: Option<&str>,
) -> Result<Box<dyn Strategy>, FundtraderError> {
    let name = match strategy_override {
        Some(name) => name.trim().to_string(),
        None => strategy_name(config)?,
    };
    let params = build_strategy_params(config, registry, &name)?;
    registry.create(&name, &params)
}

/// Everything a run needs, checked before any data is touched.
pub struct RunPlan {
    pub strategy: Box<dyn Strategy>,
    pub codes: Vec<String>,
    pub backtest: BacktestConfig,
}

pub fn plan_run(
    config: &dyn ConfigPort,
    strategy_override: Option<&str>,
    code_override: Option<&str>,
) -> Result<RunPlan, FundtraderError> {
    let backtest = build_backtest_config(config)?;
    let strategy = build_strategy(config, &StrategyRegistry::builtin(), strategy_override)?;
    let codes = resolve_codes(code_override, config)?;
    validate_data_config(config)?;
    Ok(RunPlan {
        strategy,
        codes,
        backtest,
    })
}

fn run_backtest(
    config_path: &Path,
    strategy_override: Option<&str>,
    code_override: Option<&str>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let plan = match plan_run(&config, strategy_override, code_override) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    eprintln!("Strategy: {}", plan.strategy.name());

    let data = match DataAdapter::from_config(&config) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    run_backtest_pipeline(
        data.prices(),
        data.fundamentals(),
        plan.strategy.as_ref(),
        &plan.backtest,
        &plan.codes,
        output_path,
    )
}

pub fn print_metrics(metrics: &PerformanceMetrics) {
    eprintln!("\n=== Results ===");
    eprintln!("CAGR:             {:.2}%", metrics.cagr * 100.0);
    eprintln!("Max Drawdown:     {:.2}%", metrics.max_drawdown * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Trading Days:     {}", metrics.trading_days);
}

fn print_universe(result: &BacktestResult) {
    for skipped in &result.skipped {
        let reason = match &skipped.reason {
            SkipReason::NoData => "no prices in range".to_string(),
            SkipReason::ProviderError(e) => e.clone(),
        };
        eprintln!("warning: skipped {} ({})", skipped.code, reason);
    }
    if !result.relaxed.is_empty() {
        eprintln!(
            "warning: fundamentals published after the window were used for: {}",
            result.relaxed.join(", ")
        );
    }
}

/// Run, summarise and report. An empty equity curve is a no-data failure.
pub fn run_backtest_pipeline(
    prices: &dyn PriceProvider,
    fundamentals: &dyn FundamentalProvider,
    strategy: &dyn Strategy,
    bt_config: &BacktestConfig,
    codes: &[String],
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!(
        "Running backtest: {} codes, {} to {}, rebalance {}",
        codes.len(),
        bt_config.start_date,
        bt_config.end_date,
        bt_config.cadence,
    );

    let result = match Backtester::new(prices, fundamentals).run(strategy, codes, bt_config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_universe(&result);

    let Some(metrics) = result.metrics() else {
        return fail(FundtraderError::NoData {
            code: codes.join(","),
        });
    };
    eprintln!(
        "  Processed {} dates, {} rebalances, {} trades",
        metrics.trading_days,
        result.simulation.rebalance_count,
        result.simulation.fills.len()
    );
    print_metrics(&metrics);

    let output = output_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let output_str = output.to_string_lossy();
    if let Err(e) = CsvReportAdapter.write(&result, Some(&metrics), &output_str) {
        return fail(e);
    }

    eprintln!("\nEquity curve written to: {}", output.display());
    eprintln!("Trade log written to:    {}", sibling_path(&output, "trades").display());
    ExitCode::SUCCESS
}

pub fn run_dry_run(
    config_path: &Path,
    strategy_override: Option<&str>,
    code_override: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let plan = match plan_run(&config, strategy_override, code_override) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let bt = &plan.backtest;

    eprintln!("Config validated successfully");
    eprintln!("\nBacktest:");
    eprintln!("  window:          {} to {}", bt.start_date, bt.end_date);
    eprintln!("  initial capital: {:.2}", bt.initial_capital);
    eprintln!("  commission:      {:.2}", bt.commission);
    eprintln!("  rebalance:       {}", bt.cadence);
    eprintln!("  lag days:        {}", bt.lag_days);
    eprintln!("  stale prices:    {}", bt.stale_prices);
    eprintln!("\nStrategy: {}", plan.strategy.name());
    eprintln!("\nUniverse:");
    eprintln!("  codes: {}", plan.codes.join(", "));

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_strategies() -> ExitCode {
    let registry = StrategyRegistry::builtin();
    for name in registry.names() {
        let description = registry.description(name).unwrap_or_default();
        let params = registry.parameters(name).unwrap_or_default();
        println!("{name}");
        println!("  {description}");
        if !params.is_empty() {
            println!("  parameters: {}", params.join(", "));
        }
    }
    ExitCode::SUCCESS
}

fn run_list_codes(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let data = match DataAdapter::from_config(&config) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    let codes = match data.prices().list_codes() {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if codes.is_empty() {
        eprintln!("No codes found");
    } else {
        for code in &codes {
            println!("{}", code);
        }
        eprintln!("{} codes found", codes.len());
    }
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, code_override: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let codes = match resolve_codes(code_override, &config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let data = match DataAdapter::from_config(&config) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    let (first, last) = all_dates();

    for code in &codes {
        match data.prices().fetch_prices(code, first, last) {
            Ok(bars) => match (bars.first(), bars.last()) {
                (Some(min), Some(max)) => {
                    println!("{}: {} bars, {} to {}", code, bars.len(), min.date, max.date)
                }
                _ => eprintln!("{}: no price data found", code),
            },
            Err(e) => eprintln!("error querying {}: {}", code, e),
        }
        match data.fundamentals().fetch_fundamentals(code) {
            Ok(records) if records.is_empty() => eprintln!("{}: no fundamentals", code),
            Ok(records) => {
                let fields: std::collections::BTreeSet<&str> = records
                    .iter()
                    .flat_map(|r| r.fields.keys().map(String::as_str))
                    .collect();
                println!(
                    "{}: {} fundamental periods, {} fields",
                    code,
                    records.len(),
                    fields.len()
                );
            }
            Err(e) => eprintln!("error querying fundamentals for {}: {}", code, e),
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let registry = StrategyRegistry::builtin();
    let checks: [(&str, Result<(), FundtraderError>); 3] = [
        ("backtest", validate_backtest_config(&config)),
        ("strategy", validate_strategy_config(&config, &registry)),
        ("data", validate_data_config(&config)),
    ];
    for (section, check) in checks {
        match check {
            Ok(()) => eprintln!("  [{}] ok", section),
            Err(e) => return fail(e),
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

#[cfg(feature = "sqlite")]
fn run_import(config_path: &Path, from: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match import_csv_directory(&config, from) {
        Ok(count) => {
            let target = config.get_string("data", "path").unwrap_or_default();
            eprintln!("Imported {} codes into {}", count, target);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Copy every instrument of the CSV directory `from` into the SQLite
/// database named by `[data] path`. Returns the number of codes imported.
#[cfg(feature = "sqlite")]
pub fn import_csv_directory(
    config: &dyn ConfigPort,
    from: &Path,
) -> Result<usize, FundtraderError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let source = CsvAdapter::new(from.to_path_buf());
    let target = SqliteAdapter::from_config(config)?;
    target.initialize_schema()?;

    let (first, last) = all_dates();

    let codes = source.list_codes()?;
    for code in &codes {
        let bars = source.fetch_prices(code, first, last)?;
        let records = source.fetch_fundamentals(code)?;
        target.insert_prices(code, &bars)?;
        target.insert_fundamentals(code, &records)?;
        tracing::info!(
            code = code.as_str(),
            bars = bars.len(),
            periods = records.len(),
            "imported"
        );
    }
    Ok(codes.len())
}

#[cfg(not(feature = "sqlite"))]
fn run_import(_config_path: &Path, _from: &Path) -> ExitCode {
    fail(FundtraderError::invalid(
        "data",
        "source",
        "sqlite support was not compiled in",
    ))
}
