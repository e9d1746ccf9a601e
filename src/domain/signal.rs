//! Per-instrument signals and the unified signal table.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalPoint {
    pub date: NaiveDate,
    /// 0/1 hold flag or a non-negative weight.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    pub code: String,
    pub points: Vec<SignalPoint>,
}

impl SignalSeries {
    pub fn new(code: &str) -> Self {
        SignalSeries {
            code: code.to_string(),
            points: Vec::new(),
        }
    }

    /// Build from a date column and a boolean condition column.
    pub fn from_flags(
        code: &str,
        dates: impl IntoIterator<Item = NaiveDate>,
        flags: &[bool],
    ) -> Self {
        let points = dates
            .into_iter()
            .zip(flags)
            .map(|(date, &hold)| SignalPoint {
                date,
                value: if hold { 1.0 } else { 0.0 },
            })
            .collect();
        SignalSeries {
            code: code.to_string(),
            points,
        }
    }

    pub fn push(&mut self, date: NaiveDate, value: f64) {
        self.points.push(SignalPoint { date, value });
    }
}

/// Signals of every instrument over the union of their dates.
///
/// Columns are keyed by instrument code in ascending order; each column holds
/// one value per entry of `dates`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnifiedSignalTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl UnifiedSignalTable {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn value(&self, row: usize, code: &str) -> f64 {
        self.columns
            .get(code)
            .and_then(|col| col.get(row))
            .copied()
            .unwrap_or(0.0)
    }

    /// Instruments whose signal on `row` asks for a position, ascending by code.
    pub fn selected(&self, row: usize) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(move |(_, col)| col.get(row).is_some_and(|v| *v > 0.0))
            .map(|(code, _)| code.as_str())
    }
}

/// Merge per-instrument signals onto the sorted union of their dates,
/// filling dates an instrument does not cover with 0.
pub fn aggregate(signals: &[SignalSeries]) -> UnifiedSignalTable {
    let dates: Vec<NaiveDate> = signals
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for series in signals {
        let column = columns
            .entry(series.code.clone())
            .or_insert_with(|| vec![0.0; dates.len()]);
        for point in &series.points {
            if let Ok(row) = dates.binary_search(&point.date) {
                column[row] = if point.value.is_finite() && point.value > 0.0 {
                    point.value
                } else {
                    0.0
                };
            }
        }
    }

    UnifiedSignalTable { dates, columns }
}
