//! Rebalance cadence and the per-date scheduler state machine.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use super::error::FundtraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceCadence {
    Daily,
    /// Every N visited calendar dates; the first trigger is on the Nth date.
    EveryN(usize),
    Weekly,
    Monthly,
}

impl RebalanceCadence {
    pub fn validate(&self) -> Result<(), FundtraderError> {
        match self {
            RebalanceCadence::EveryN(0) => Err(FundtraderError::invalid(
                "backtest",
                "rebalance",
                "rebalance interval must be positive",
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for RebalanceCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceCadence::Daily => write!(f, "Daily"),
            RebalanceCadence::EveryN(n) => write!(f, "every {} dates", n),
            RebalanceCadence::Weekly => write!(f, "Weekly"),
            RebalanceCadence::Monthly => write!(f, "Monthly"),
        }
    }
}

impl FromStr for RebalanceCadence {
    type Err = FundtraderError;

    /// Accepts `Daily`, `Weekly`, `Monthly` (any case) or a positive integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "daily" => return Ok(RebalanceCadence::Daily),
            "weekly" => return Ok(RebalanceCadence::Weekly),
            "monthly" => return Ok(RebalanceCadence::Monthly),
            _ => {}
        }
        match trimmed.parse::<i64>() {
            Ok(n) if n > 0 => Ok(RebalanceCadence::EveryN(n as usize)),
            Ok(n) => Err(FundtraderError::invalid(
                "backtest",
                "rebalance",
                format!("rebalance interval must be positive, got {}", n),
            )),
            Err(_) => Err(FundtraderError::invalid(
                "backtest",
                "rebalance",
                format!(
                    "unrecognized cadence '{}' (expected Daily, Weekly, Monthly or a positive integer)",
                    trimmed
                ),
            )),
        }
    }
}

/// Decides once per calendar date, in ascending order, whether to rebalance.
#[derive(Debug, Clone)]
pub struct RebalanceScheduler {
    cadence: RebalanceCadence,
    previous_date: Option<NaiveDate>,
    counter: usize,
}

impl RebalanceScheduler {
    pub fn new(cadence: RebalanceCadence) -> Result<Self, FundtraderError> {
        cadence.validate()?;
        Ok(RebalanceScheduler {
            cadence,
            previous_date: None,
            counter: 0,
        })
    }

    pub fn cadence(&self) -> RebalanceCadence {
        self.cadence
    }

    pub fn should_rebalance(&mut self, date: NaiveDate) -> bool {
        let fire = match self.cadence {
            RebalanceCadence::Daily => true,
            RebalanceCadence::EveryN(n) => {
                self.counter += 1;
                if self.counter >= n {
                    self.counter = 0;
                    true
                } else {
                    false
                }
            }
            RebalanceCadence::Weekly => match self.previous_date {
                None => true,
                Some(prev) => prev.iso_week() != date.iso_week(),
            },
            RebalanceCadence::Monthly => match self.previous_date {
                None => true,
                Some(prev) => prev.month() != date.month() || prev.year() != date.year(),
            },
        };
        self.previous_date = Some(date);
        fire
    }
}
