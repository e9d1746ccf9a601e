#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use fundtrader::domain::error::FundtraderError;
use fundtrader::domain::fundamental::FundamentalRecord;
pub use fundtrader::domain::price::PriceBar;
use fundtrader::ports::fundamental_port::FundamentalProvider;
use fundtrader::ports::price_port::PriceProvider;
use std::collections::HashMap;

pub struct MockPriceProvider {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl PriceProvider for MockPriceProvider {
    fn fetch_prices(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FundtraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(FundtraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_codes(&self) -> Result<Vec<String>, FundtraderError> {
        let mut codes: Vec<String> = self.data.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }
}

pub struct MockFundamentalProvider {
    pub data: HashMap<String, Vec<FundamentalRecord>>,
    pub errors: HashMap<String, String>,
}

impl MockFundamentalProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_records(mut self, code: &str, records: Vec<FundamentalRecord>) -> Self {
        self.data.insert(code.to_string(), records);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl FundamentalProvider for MockFundamentalProvider {
    fn fetch_fundamentals(&self, code: &str) -> Result<Vec<FundamentalRecord>, FundtraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(FundtraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(code).cloned().unwrap_or_default())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// One bar per weekday starting at `start`, closes taken from `closes`.
pub fn make_bars(start: &str, closes: &[f64]) -> Vec<PriceBar> {
    let mut day = date(start);
    let mut bars = Vec::with_capacity(closes.len());
    for &close in closes {
        while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day = day.succ_opt().unwrap();
        }
        bars.push(PriceBar::new(day, close));
        day = day.succ_opt().unwrap();
    }
    bars
}

/// Quarterly balance sheet and income lines the built-in strategies read.
pub fn quarter(period_end: &str, equity: f64, net_income: f64, shares: f64) -> FundamentalRecord {
    FundamentalRecord::new(date(period_end))
        .with_field("Stockholders Equity", equity)
        .with_field("Net Income", net_income)
        .with_field("Ordinary Shares Number", shares)
}

pub fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
