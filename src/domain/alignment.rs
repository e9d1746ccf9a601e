//! Point-in-time alignment of fundamentals onto a daily price calendar.
//!
//! Each fundamental record becomes visible `lag_days` after its period end.
//! Every price row carries the most recent record published on or before the
//! row's date, forward-filled until the next publication.
//!
//! Known limitation: when every record is published after the last price date
//! (the source only exposes recent history), alignment falls back to the
//! earliest record for the whole range instead of leaving every row without
//! fundamentals. That path leaks future information into the backtest and is
//! flagged through [`AlignedSeries::relaxed`]. Disable it with
//! [`AlignOptions::allow_fallback`].

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

use super::fundamental::FundamentalRecord;
use super::price::PriceBar;

pub const DEFAULT_LAG_DAYS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignOptions {
    pub lag_days: i64,
    pub allow_fallback: bool,
}

impl Default for AlignOptions {
    fn default() -> Self {
        AlignOptions {
            lag_days: DEFAULT_LAG_DAYS,
            allow_fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub date: NaiveDate,
    pub close: f64,
    /// Index into [`AlignedSeries::records`] of the visible record, if any.
    pub record: Option<usize>,
}

/// One instrument's daily prices joined with its published fundamentals.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    pub code: String,
    pub rows: Vec<AlignedRow>,
    /// Records sorted ascending by period end.
    pub records: Vec<FundamentalRecord>,
    pub lag_days: i64,
    /// True when the look-ahead fallback supplied the fundamentals.
    pub relaxed: bool,
    date_index: HashMap<NaiveDate, usize>,
}

impl AlignedSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn row(&self, date: NaiveDate) -> Option<&AlignedRow> {
        self.index_of(date).map(|i| &self.rows[i])
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.row(date).map(|r| r.close)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|r| r.date)
    }

    pub fn has_fundamentals(&self) -> bool {
        !self.records.is_empty()
    }

    /// Every field name disclosed by any record of this instrument.
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .flat_map(|r| r.fields.keys().map(String::as_str))
            .collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.records.iter().any(|r| r.fields.contains_key(field))
    }

    pub fn record_at(&self, row_idx: usize) -> Option<&FundamentalRecord> {
        self.rows
            .get(row_idx)
            .and_then(|row| row.record)
            .map(|i| &self.records[i])
    }

    /// Fundamental field visible on row `row_idx`; `None` when nothing has
    /// been published yet or the visible record lacks the field.
    pub fn fundamental(&self, row_idx: usize, field: &str) -> Option<f64> {
        self.record_at(row_idx).and_then(|r| r.get(field))
    }

    /// Column of a fundamental field with `NaN` for absent values.
    pub fn field_column(&self, field: &str) -> Vec<f64> {
        (0..self.rows.len())
            .map(|i| self.fundamental(i, field).unwrap_or(f64::NAN))
            .collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }
}

/// Align with the default fallback behaviour.
pub fn align(
    code: &str,
    prices: &[PriceBar],
    records: &[FundamentalRecord],
    lag_days: i64,
) -> AlignedSeries {
    align_with(
        code,
        prices,
        records,
        AlignOptions {
            lag_days,
            ..AlignOptions::default()
        },
    )
}

pub fn align_with(
    code: &str,
    prices: &[PriceBar],
    records: &[FundamentalRecord],
    options: AlignOptions,
) -> AlignedSeries {
    let date_index = prices
        .iter()
        .enumerate()
        .map(|(i, bar)| (bar.date, i))
        .collect();

    if records.is_empty() {
        return AlignedSeries {
            code: code.to_string(),
            rows: prices
                .iter()
                .map(|bar| AlignedRow {
                    date: bar.date,
                    close: bar.close,
                    record: None,
                })
                .collect(),
            records: Vec::new(),
            lag_days: options.lag_days,
            relaxed: false,
            date_index,
        };
    }

    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.period_end);
    let published: Vec<NaiveDate> = sorted
        .iter()
        .map(|r| r.publication_date(options.lag_days))
        .collect();

    // All publications postdate the price range: nothing would ever be visible.
    let fallback = options.allow_fallback
        && prices
            .last()
            .is_some_and(|last| published.first().is_some_and(|p| *p > last.date));

    let mut rows = Vec::with_capacity(prices.len());
    let mut visible = 0usize;
    for bar in prices {
        while visible < published.len() && published[visible] <= bar.date {
            visible += 1;
        }
        let record = if fallback {
            Some(0)
        } else {
            visible.checked_sub(1)
        };
        rows.push(AlignedRow {
            date: bar.date,
            close: bar.close,
            record,
        });
    }

    if fallback {
        tracing::warn!(
            code,
            earliest_publication = %published[0],
            "no fundamentals published within price range; using earliest record (look-ahead)"
        );
    }

    AlignedSeries {
        code: code.to_string(),
        rows,
        records: sorted,
        lag_days: options.lag_days,
        relaxed: fallback,
        date_index,
    }
}
