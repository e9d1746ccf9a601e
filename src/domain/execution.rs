//! Rebalance trade execution.
//!
//! Moves a portfolio toward equal target weights: every held instrument is
//! sold down to its target first, then candidates are bought up to theirs
//! with whatever cash is available. A flat commission is charged once per
//! executed trade. No slippage, fractional shares allowed, long only.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::portfolio::Portfolio;

/// Value differences below this fraction of equity are treated as already
/// on target, so float noise never triggers a commission-charging trade.
const DUST_FRACTION: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// One executed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub date: NaiveDate,
    pub code: String,
    pub side: Side,
    pub shares: f64,
    pub price: f64,
    pub commission: f64,
}

/// Equal weight `1/k` for each of the `k` candidates; empty when there are
/// none, which liquidates everything to cash.
pub fn target_weights<'a>(candidates: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, f64> {
    let codes: Vec<&str> = candidates.into_iter().collect();
    if codes.is_empty() {
        return BTreeMap::new();
    }
    let weight = 1.0 / codes.len() as f64;
    codes.into_iter().map(|c| (c.to_string(), weight)).collect()
}

/// Portfolio after a rebalance together with the trades that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Rebalanced {
    pub portfolio: Portfolio,
    pub fills: Vec<Fill>,
}

struct TradeContext<'a> {
    prices: &'a BTreeMap<String, f64>,
    weights: &'a BTreeMap<String, f64>,
    equity: f64,
    commission: f64,
    dust: f64,
    date: NaiveDate,
}

impl TradeContext<'_> {
    fn target_value(&self, code: &str) -> f64 {
        self.equity * self.weights.get(code).copied().unwrap_or(0.0)
    }
}

/// Rebalance `portfolio` toward `weights` of `equity`.
///
/// Only instruments present in `prices` are traded; `weights` must only name
/// priced instruments.
pub fn rebalance(
    mut portfolio: Portfolio,
    prices: &BTreeMap<String, f64>,
    weights: &BTreeMap<String, f64>,
    equity: f64,
    commission: f64,
    date: NaiveDate,
) -> Rebalanced {
    let ctx = TradeContext {
        prices,
        weights,
        equity,
        commission,
        dust: equity.abs() * DUST_FRACTION,
        date,
    };
    let mut fills = sell_phase(&mut portfolio, &ctx);
    fills.extend(buy_phase(&mut portfolio, &ctx));

    Rebalanced { portfolio, fills }
}

fn sell_phase(portfolio: &mut Portfolio, ctx: &TradeContext<'_>) -> Vec<Fill> {
    let held: Vec<(String, f64)> = portfolio
        .holdings
        .iter()
        .map(|(code, shares)| (code.clone(), *shares))
        .collect();

    let mut fills = Vec::new();
    for (code, shares) in held {
        let Some(&price) = ctx.prices.get(&code) else {
            continue;
        };
        let target_value = ctx.target_value(&code);
        let current_value = shares * price;
        if current_value - target_value <= ctx.dust {
            continue;
        }

        let shares_sold = (current_value - target_value) / price;
        portfolio.cash += shares_sold * price - ctx.commission;
        portfolio.remove_shares(&code, shares_sold);

        tracing::debug!(date = %ctx.date, code = code.as_str(), shares_sold, price, "sell");
        fills.push(Fill {
            date: ctx.date,
            code,
            side: Side::Sell,
            shares: shares_sold,
            price,
            commission: ctx.commission,
        });
    }
    fills
}

fn buy_phase(portfolio: &mut Portfolio, ctx: &TradeContext<'_>) -> Vec<Fill> {
    let mut fills = Vec::new();
    for code in ctx.weights.keys() {
        let Some(&price) = ctx.prices.get(code) else {
            continue;
        };
        let target_value = ctx.target_value(code);
        let current_value = portfolio.shares(code) * price;
        if target_value - current_value <= ctx.dust {
            continue;
        }

        let spend = (target_value - current_value).min(portfolio.cash);
        if spend <= 0.0 {
            continue;
        }
        let shares_bought = (spend - ctx.commission) / price;
        if shares_bought <= 0.0 {
            continue;
        }

        portfolio.cash -= shares_bought * price + ctx.commission;
        portfolio.add_shares(code, shares_bought);

        tracing::debug!(date = %ctx.date, code = code.as_str(), shares_bought, price, "buy");
        fills.push(Fill {
            date: ctx.date,
            code: code.clone(),
            side: Side::Buy,
            shares: shares_bought,
            price,
            commission: ctx.commission,
        });
    }
    fills
}
