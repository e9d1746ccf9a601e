//! Portfolio simulator: one ascending pass over the signal calendar.
//!
//! For every date the portfolio is marked to market, the equity point is
//! recorded, and on scheduled dates the portfolio is rebalanced toward equal
//! weights across the selected, priced instruments. The portfolio value is
//! threaded through [`step`] explicitly; nothing else mutates it.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::alignment::AlignedSeries;
use super::error::FundtraderError;
use super::execution::{rebalance, target_weights, Fill};
use super::portfolio::{EquityPoint, Portfolio};
use super::schedule::{RebalanceCadence, RebalanceScheduler};
use super::signal::UnifiedSignalTable;

/// How a held instrument without a close on the current date is valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePricePolicy {
    /// Leave it out of that day's equity.
    #[default]
    Skip,
    /// Value it at its most recent observed close. It is still not traded.
    LastKnown,
}

impl fmt::Display for StalePricePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StalePricePolicy::Skip => write!(f, "skip"),
            StalePricePolicy::LastKnown => write!(f, "last_known"),
        }
    }
}

impl FromStr for StalePricePolicy {
    type Err = FundtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(StalePricePolicy::Skip),
            "last_known" | "last-known" => Ok(StalePricePolicy::LastKnown),
            other => Err(FundtraderError::invalid(
                "backtest",
                "stale_prices",
                format!("unrecognized policy '{}' (expected skip or last_known)", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub commission: f64,
    pub cadence: RebalanceCadence,
    pub stale_prices: StalePricePolicy,
}

impl SimulationConfig {
    pub fn new(initial_capital: f64, commission: f64, cadence: RebalanceCadence) -> Self {
        SimulationConfig {
            initial_capital,
            commission,
            cadence,
            stale_prices: StalePricePolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), FundtraderError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(FundtraderError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        if !(self.commission.is_finite() && self.commission >= 0.0) {
            return Err(FundtraderError::invalid(
                "backtest",
                "commission",
                "commission must be non-negative",
            ));
        }
        self.cadence.validate()
    }
}

/// Everything [`step`] needs to know about one calendar date.
#[derive(Debug, Clone)]
pub struct Day<'a> {
    pub date: NaiveDate,
    /// Closes observed on this date.
    pub prices: &'a BTreeMap<String, f64>,
    /// Last known closes for held instruments missing from `prices`.
    pub stale: &'a BTreeMap<String, f64>,
    /// Instruments whose signal asks for a position on this date.
    pub selected: &'a [&'a str],
    pub rebalance: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub portfolio: Portfolio,
    /// Marked-to-market equity before any trade on this date.
    pub equity: f64,
    pub fills: Vec<Fill>,
}

/// Advance the portfolio by one date.
pub fn step(portfolio: Portfolio, day: &Day<'_>, commission: f64) -> StepOutcome {
    let stale_value: f64 = portfolio
        .holdings
        .iter()
        .filter(|(code, _)| !day.prices.contains_key(*code))
        .filter_map(|(code, shares)| day.stale.get(code).map(|price| shares * price))
        .sum();
    let equity = portfolio.total_equity(day.prices) + stale_value;

    if !day.rebalance {
        return StepOutcome {
            portfolio,
            equity,
            fills: Vec::new(),
        };
    }

    let candidates = day
        .selected
        .iter()
        .copied()
        .filter(|code| day.prices.get(*code).is_some_and(|p| *p > 0.0));
    let weights = target_weights(candidates);
    tracing::debug!(date = %day.date, equity, candidates = weights.len(), "rebalance");

    let out = rebalance(portfolio, day.prices, &weights, equity, commission, day.date);
    StepOutcome {
        portfolio: out.portfolio,
        equity,
        fills: out.fills,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub final_portfolio: Portfolio,
    pub rebalance_count: usize,
}

/// Run the portfolio over every date of `signals`, in ascending order.
///
/// Fails only on invalid configuration, before any date is processed.
pub fn simulate(
    aligned: &[AlignedSeries],
    signals: &UnifiedSignalTable,
    config: &SimulationConfig,
) -> Result<SimulationResult, FundtraderError> {
    config.validate()?;
    let mut scheduler = RebalanceScheduler::new(config.cadence)?;

    let series_by_code: BTreeMap<&str, &AlignedSeries> =
        aligned.iter().map(|s| (s.code.as_str(), s)).collect();

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut last_close: BTreeMap<String, f64> = BTreeMap::new();
    let mut equity_curve = Vec::with_capacity(signals.dates().len());
    let mut fills = Vec::new();
    let mut rebalance_count = 0usize;

    for (row, &date) in signals.dates().iter().enumerate() {
        let prices: BTreeMap<String, f64> = series_by_code
            .iter()
            .filter_map(|(code, series)| {
                series
                    .close_on(date)
                    .filter(|c| c.is_finite() && *c >= 0.0)
                    .map(|c| (code.to_string(), c))
            })
            .collect();

        let stale: BTreeMap<String, f64> = match config.stale_prices {
            StalePricePolicy::Skip => BTreeMap::new(),
            StalePricePolicy::LastKnown => portfolio
                .held_codes()
                .filter(|code| !prices.contains_key(*code))
                .filter_map(|code| last_close.get(code).map(|p| (code.to_string(), *p)))
                .collect(),
        };

        let selected: Vec<&str> = signals.selected(row).collect();
        let rebalance = scheduler.should_rebalance(date);
        if rebalance {
            rebalance_count += 1;
        }

        let day = Day {
            date,
            prices: &prices,
            stale: &stale,
            selected: &selected,
            rebalance,
        };
        let outcome = step(portfolio, &day, config.commission);
        portfolio = outcome.portfolio;
        equity_curve.push(EquityPoint {
            date,
            equity: outcome.equity,
        });
        fills.extend(outcome.fills);

        last_close.extend(prices);
    }

    tracing::info!(
        dates = equity_curve.len(),
        rebalances = rebalance_count,
        trades = fills.len(),
        "simulation complete"
    );

    Ok(SimulationResult {
        equity_curve,
        fills,
        final_portfolio: portfolio,
        rebalance_count,
    })
}
