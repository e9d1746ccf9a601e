//! Instrument universe: code list parsing and price loading.
//!
//! Provider failures never abort a run. An instrument whose prices cannot be
//! fetched, or that has none in the window, is skipped and reported.

use crate::domain::price::{normalize_bars, PriceBar};
use crate::ports::price_port::PriceProvider;
use chrono::NaiveDate;
use std::collections::HashSet;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    ProviderError(String),
}

/// Prices of every instrument that has any in the window, in input order.
#[derive(Debug, Clone, Default)]
pub struct LoadedUniverse {
    pub prices: Vec<(String, Vec<PriceBar>)>,
    pub skipped: Vec<SkippedCode>,
}

impl LoadedUniverse {
    pub fn count(&self) -> usize {
        self.prices.len()
    }
}

pub fn load_prices(
    provider: &dyn PriceProvider,
    codes: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> LoadedUniverse {
    let mut loaded = LoadedUniverse::default();

    for code in codes {
        let bars = match provider.fetch_prices(code, start_date, end_date) {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!(
                    code = code.as_str(),
                    error = %e,
                    "skipping instrument: price fetch failed"
                );
                loaded.skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::ProviderError(e.to_string()),
                });
                continue;
            }
        };

        let bars: Vec<PriceBar> = normalize_bars(bars)
            .into_iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .collect();
        if bars.is_empty() {
            tracing::warn!(code = code.as_str(), "skipping instrument: no prices in range");
            loaded.skipped.push(SkippedCode {
                code: code.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        tracing::info!(code = code.as_str(), bars = bars.len(), "loaded prices");
        loaded.prices.push((code.clone(), bars));
    }

    if !loaded.skipped.is_empty() {
        tracing::info!(
            loaded = loaded.count(),
            requested = codes.len(),
            "some instruments were skipped"
        );
    }

    loaded
}
