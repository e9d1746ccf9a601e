//! Fundamental selection strategies and the name-keyed registry.
//!
//! A strategy turns aligned series into per-instrument metric tables and
//! then into hold/flat signals. Variants share the two-operation contract of
//! [`Strategy`] and differ only in formulas and thresholds.

pub mod fundamental_value;
pub mod multi_factor;
pub mod value_roe;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

use super::alignment::AlignedSeries;
use super::error::FundtraderError;
use super::signal::SignalSeries;

pub trait Strategy {
    fn name(&self) -> &str;

    /// Metric columns per instrument. Instruments lacking the fields the
    /// strategy needs are left out.
    fn calculate_metrics(&self, aligned: &[AlignedSeries]) -> Vec<MetricSeries>;

    /// One hold (1) / flat (0) signal series per instrument with metrics.
    fn generate_signals(&self, aligned: &[AlignedSeries]) -> Vec<SignalSeries>;
}

/// Named metric columns over one instrument's price dates. Undefined values
/// are `NaN`, so every comparison against them is false.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub code: String,
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl MetricSeries {
    pub fn for_series(series: &AlignedSeries) -> Self {
        MetricSeries {
            code: series.code.clone(),
            dates: series.dates().collect(),
            columns: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, values: Vec<f64>) {
        self.columns.insert(name.to_string(), values);
    }

    pub fn with(mut self, name: &str, values: Vec<f64>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Value of `name` on `row`, `NaN` when the column or row is missing.
    pub fn value(&self, name: &str, row: usize) -> f64 {
        self.column(name)
            .and_then(|col| col.get(row))
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Signal series holding on every row where `hold` is true.
    pub fn signals_where(&self, hold: impl Fn(usize) -> bool) -> SignalSeries {
        let flags: Vec<bool> = (0..self.dates.len()).map(hold).collect();
        SignalSeries::from_flags(&self.code, self.dates.iter().copied(), &flags)
    }
}

/// `numerator / denominator`, `NaN` when the denominator is zero or either
/// side is undefined.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || numerator.is_nan() || denominator.is_nan() {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Element-wise [`ratio`] of two equal-length columns.
pub fn ratio_column(numerators: &[f64], denominators: &[f64]) -> Vec<f64> {
    numerators
        .iter()
        .zip(denominators)
        .map(|(n, d)| ratio(*n, *d))
        .collect()
}

/// First disclosed field name, in ascending order, containing one of
/// `patterns` and none of `excluded`.
pub fn find_field<'a>(
    series: &'a AlignedSeries,
    patterns: &[&str],
    excluded: &[&str],
) -> Option<&'a str> {
    series.field_names().into_iter().find(|name| {
        patterns.iter().any(|p| name.contains(p)) && !excluded.iter().any(|e| name.contains(e))
    })
}

/// Numeric strategy parameters read by name, with per-strategy defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyParams {
    values: BTreeMap<String, f64>,
}

impl StrategyParams {
    pub fn new() -> Self {
        StrategyParams::default()
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.values.get(name).copied().unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for StrategyParams {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        StrategyParams {
            values: iter.into_iter().collect(),
        }
    }
}

pub type StrategyConstructor = fn(&StrategyParams) -> Box<dyn Strategy>;

struct RegistryEntry {
    description: &'static str,
    parameters: &'static [&'static str],
    constructor: StrategyConstructor,
}

/// Strategy constructors keyed by name.
pub struct StrategyRegistry {
    entries: BTreeMap<&'static str, RegistryEntry>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        StrategyRegistry {
            entries: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in strategy.
    pub fn builtin() -> Self {
        let mut registry = StrategyRegistry::empty();
        registry.register(
            value_roe::NAME,
            "P/B below pb_max and ROE above roe_min",
            value_roe::PARAMETERS,
            value_roe::create,
        );
        registry.register(
            fundamental_value::NAME,
            "(P/B below pb_max or 0 < P/E below pe_max) and annualised ROE above roe_min",
            fundamental_value::PARAMETERS,
            fundamental_value::create,
        );
        registry.register(
            multi_factor::NAME,
            "market cap, free cash flow and ROE screens",
            multi_factor::PARAMETERS,
            multi_factor::create,
        );
        registry.register(
            multi_factor::FULL_NAME,
            "multi_factor plus operating income growth and price-to-sales screens",
            multi_factor::FULL_PARAMETERS,
            multi_factor::create_full,
        );
        registry
    }

    pub fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        parameters: &'static [&'static str],
        constructor: StrategyConstructor,
    ) {
        self.entries.insert(
            name,
            RegistryEntry {
                description,
                parameters,
                constructor,
            },
        );
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.entries.get(name).map(|e| e.description)
    }

    pub fn parameters(&self, name: &str) -> Option<&'static [&'static str]> {
        self.entries.get(name).map(|e| e.parameters)
    }

    pub fn create(
        &self,
        name: &str,
        params: &StrategyParams,
    ) -> Result<Box<dyn Strategy>, FundtraderError> {
        match self.entries.get(name) {
            Some(entry) => Ok((entry.constructor)(params)),
            None => Err(FundtraderError::UnknownStrategy {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            }),
        }
    }
}
