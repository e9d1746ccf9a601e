//! Periodic fundamental disclosures.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One reporting period's disclosed fields, keyed by the period-end date.
///
/// Field names are free-form (`Net Income`, `Stockholders Equity`, ...) and
/// interpreted only by strategies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FundamentalRecord {
    pub period_end: NaiveDate,
    pub fields: BTreeMap<String, f64>,
}

impl FundamentalRecord {
    pub fn new(period_end: NaiveDate) -> Self {
        FundamentalRecord {
            period_end,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    /// Date the record is assumed to become public.
    pub fn publication_date(&self, lag_days: i64) -> NaiveDate {
        self.period_end + chrono::Duration::days(lag_days)
    }
}
