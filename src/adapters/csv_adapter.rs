//! CSV file data adapter.
//!
//! One directory holds `<CODE>.csv` price files (`date,close`, extra columns
//! ignored) and optional `<CODE>_fundamentals.csv` files
//! (`period_end,<field>,<field>,...`). Empty fundamental cells are absent
//! fields.

use crate::domain::error::FundtraderError;
use crate::domain::fundamental::FundamentalRecord;
use crate::domain::price::{normalize_bars, PriceBar};
use crate::ports::fundamental_port::FundamentalProvider;
use crate::ports::price_port::PriceProvider;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

const FUNDAMENTALS_SUFFIX: &str = "_fundamentals.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn price_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn fundamentals_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}{}", code, FUNDAMENTALS_SUFFIX))
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, FundtraderError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| FundtraderError::Database {
        reason: format!("invalid date '{}': {}", value, e),
    })
}

fn parse_value(value: &str, column: &str) -> Result<f64, FundtraderError> {
    value
        .trim()
        .parse()
        .map_err(|e| FundtraderError::Database {
            reason: format!("invalid {} value '{}': {}", column, value, e),
        })
}

impl PriceProvider for CsvAdapter {
    fn fetch_prices(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, FundtraderError> {
        let path = self.price_path(code);
        let content = fs::read_to_string(&path).map_err(|e| FundtraderError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| FundtraderError::Database {
            reason: format!("CSV header error: {}", e),
        })?;
        let close_idx = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("close"))
            .unwrap_or(1);

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| FundtraderError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| FundtraderError::Database {
                reason: "missing date column".into(),
            })?;
            let date = parse_date(date_str)?;
            if date < start_date || date > end_date {
                continue;
            }

            // A blank close is a missing observation, not a zero price.
            let close = match record.get(close_idx).map(str::trim) {
                None | Some("") => continue,
                Some(raw) => parse_value(raw, "close")?,
            };

            bars.push(PriceBar::new(date, close));
        }

        Ok(normalize_bars(bars))
    }

    fn list_codes(&self) -> Result<Vec<String>, FundtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| FundtraderError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FundtraderError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if name_str.ends_with(FUNDAMENTALS_SUFFIX) {
                continue;
            }
            if let Some(code) = name_str.strip_suffix(".csv") {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }
}

impl FundamentalProvider for CsvAdapter {
    fn fetch_fundamentals(&self, code: &str) -> Result<Vec<FundamentalRecord>, FundtraderError> {
        let path = self.fundamentals_path(code);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).map_err(|e| FundtraderError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let fields: Vec<String> = rdr
            .headers()
            .map_err(|e| FundtraderError::Database {
                reason: format!("CSV header error: {}", e),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in rdr.records() {
            let row = result.map_err(|e| FundtraderError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;
            let period_end = parse_date(row.get(0).ok_or_else(|| FundtraderError::Database {
                reason: "missing period_end column".into(),
            })?)?;

            let mut record = FundamentalRecord::new(period_end);
            for (field, raw) in fields.iter().zip(row.iter()).skip(1) {
                if raw.trim().is_empty() {
                    continue;
                }
                record.fields.insert(field.clone(), parse_value(raw, field)?);
            }
            records.push(record);
        }

        Ok(records)
    }
}
