//! Backtest orchestration.
//!
//! Wires the collaborators together for one run: load prices, align
//! fundamentals, ask the strategy for signals, aggregate them, simulate.
//! Providers are injected at construction so the pipeline never touches a
//! file or database directly.

use chrono::NaiveDate;

use super::alignment::{align_with, AlignOptions, AlignedSeries, DEFAULT_LAG_DAYS};
use super::error::FundtraderError;
use super::fundamental::FundamentalRecord;
use super::metrics::{analyze_performance, PerformanceMetrics};
use super::portfolio::EquityPoint;
use super::schedule::RebalanceCadence;
use super::signal::aggregate;
use super::simulation::{simulate, SimulationConfig, SimulationResult, StalePricePolicy};
use super::strategy::Strategy;
use super::universe::{load_prices, SkippedCode};
use crate::ports::fundamental_port::FundamentalProvider;
use crate::ports::price_port::PriceProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    /// Flat amount charged per executed trade.
    pub commission: f64,
    pub cadence: RebalanceCadence,
    pub lag_days: i64,
    pub stale_prices: StalePricePolicy,
    /// Use the earliest record when nothing is published inside the window.
    pub fundamental_fallback: bool,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, initial_capital: f64) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            initial_capital,
            commission: 0.0,
            cadence: RebalanceCadence::Daily,
            lag_days: DEFAULT_LAG_DAYS,
            stale_prices: StalePricePolicy::Skip,
            fundamental_fallback: true,
        }
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            initial_capital: self.initial_capital,
            commission: self.commission,
            cadence: self.cadence,
            stale_prices: self.stale_prices,
        }
    }

    pub fn validate(&self) -> Result<(), FundtraderError> {
        if self.start_date > self.end_date {
            return Err(FundtraderError::invalid(
                "backtest",
                "end_date",
                format!(
                    "end_date {} must not be before start_date {}",
                    self.end_date, self.start_date
                ),
            ));
        }
        if self.lag_days < 0 {
            return Err(FundtraderError::invalid(
                "backtest",
                "lag_days",
                "lag_days must be non-negative",
            ));
        }
        self.simulation().validate()
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: String,
    pub codes: Vec<String>,
    pub skipped: Vec<SkippedCode>,
    /// Instruments whose fundamentals came from the look-ahead fallback.
    pub relaxed: Vec<String>,
    pub simulation: SimulationResult,
}

impl BacktestResult {
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.simulation.equity_curve
    }

    pub fn metrics(&self) -> Option<PerformanceMetrics> {
        analyze_performance(self.equity_curve())
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve().last().map(|p| p.equity)
    }
}

pub struct Backtester<'a> {
    prices: &'a dyn PriceProvider,
    fundamentals: &'a dyn FundamentalProvider,
}

impl<'a> Backtester<'a> {
    pub fn new(prices: &'a dyn PriceProvider, fundamentals: &'a dyn FundamentalProvider) -> Self {
        Backtester {
            prices,
            fundamentals,
        }
    }

    fn fetch_fundamentals(&self, code: &str) -> Vec<FundamentalRecord> {
        match self.fundamentals.fetch_fundamentals(code) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(code, error = %e, "fundamental fetch failed; continuing without");
                Vec::new()
            }
        }
    }

    /// Load and align every instrument of `codes`.
    pub fn prepare(
        &self,
        codes: &[String],
        config: &BacktestConfig,
    ) -> (Vec<AlignedSeries>, Vec<SkippedCode>) {
        let loaded = load_prices(self.prices, codes, config.start_date, config.end_date);
        let options = AlignOptions {
            lag_days: config.lag_days,
            allow_fallback: config.fundamental_fallback,
        };

        let aligned = loaded
            .prices
            .iter()
            .map(|(code, bars)| {
                let records = self.fetch_fundamentals(code);
                align_with(code, bars, &records, options)
            })
            .collect();
        (aligned, loaded.skipped)
    }

    /// Run `strategy` over `codes`.
    ///
    /// Configuration is checked before any provider is called; after that the
    /// run always completes.
    pub fn run(
        &self,
        strategy: &dyn Strategy,
        codes: &[String],
        config: &BacktestConfig,
    ) -> Result<BacktestResult, FundtraderError> {
        config.validate()?;
        tracing::info!(
            strategy = strategy.name(),
            codes = codes.len(),
            start = %config.start_date,
            end = %config.end_date,
            cadence = %config.cadence,
            "starting backtest"
        );

        let (aligned, skipped) = self.prepare(codes, config);
        let relaxed: Vec<String> = aligned
            .iter()
            .filter(|s| s.relaxed)
            .map(|s| s.code.clone())
            .collect();

        let signals = strategy.generate_signals(&aligned);
        let table = aggregate(&signals);
        let simulation = simulate(&aligned, &table, &config.simulation())?;

        Ok(BacktestResult {
            strategy: strategy.name().to_string(),
            codes: aligned.iter().map(|s| s.code.clone()).collect(),
            skipped,
            relaxed,
            simulation,
        })
    }
}

/// One-shot form of [`Backtester::run`].
pub fn run_backtest(
    prices: &dyn PriceProvider,
    fundamentals: &dyn FundamentalProvider,
    strategy: &dyn Strategy,
    codes: &[String],
    config: &BacktestConfig,
) -> Result<BacktestResult, FundtraderError> {
    Backtester::new(prices, fundamentals).run(strategy, codes, config)
}
