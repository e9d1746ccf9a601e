//! Portfolio state and equity points.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Cash plus long-only, possibly fractional, share holdings.
///
/// Holdings are kept in a `BTreeMap` so every pass over them runs in
/// ascending code order.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub holdings: BTreeMap<String, f64>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            holdings: BTreeMap::new(),
        }
    }

    pub fn shares(&self, code: &str) -> f64 {
        self.holdings.get(code).copied().unwrap_or(0.0)
    }

    pub fn add_shares(&mut self, code: &str, shares: f64) {
        *self.holdings.entry(code.to_string()).or_insert(0.0) += shares;
    }

    /// Remove shares, clamping at zero so a holding never turns short.
    pub fn remove_shares(&mut self, code: &str, shares: f64) {
        if let Some(held) = self.holdings.get_mut(code) {
            *held = (*held - shares).max(0.0);
        }
    }

    /// Codes with a non-zero holding, ascending.
    pub fn held_codes(&self) -> impl Iterator<Item = &str> {
        self.holdings
            .iter()
            .filter(|(_, shares)| **shares > 0.0)
            .map(|(code, _)| code.as_str())
    }

    pub fn position_count(&self) -> usize {
        self.held_codes().count()
    }

    /// Cash plus the value of every holding that has a price in `price_map`.
    /// Holdings without a price are left out.
    pub fn total_equity(&self, price_map: &BTreeMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .holdings
            .iter()
            .filter_map(|(code, shares)| price_map.get(code).map(|price| shares * price))
            .sum();
        self.cash + position_value
    }
}
