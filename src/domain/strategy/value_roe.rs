//! Price-to-book plus return-on-equity screen.
//!
//! Holds while `P/B < pb_max` and `ROE > roe_min`, where
//! `P/B = close / (equity / shares)` and `ROE = net income / equity`.
//! Providers name their fields inconsistently, so columns are matched by
//! substring.

use super::{find_field, ratio, ratio_column, MetricSeries, Strategy, StrategyParams};
use crate::domain::alignment::AlignedSeries;
use crate::domain::signal::SignalSeries;

pub const NAME: &str = "value_roe";
pub const PARAMETERS: &[&str] = &["pb_max", "roe_min"];

const EQUITY_FIELDS: &[&str] = &["Stockholders Equity", "Total Stockholder Equity"];
const INCOME_FIELDS: &[&str] = &["Net Income"];
const SHARES_FIELDS: &[&str] = &["Share Issued", "Ordinary Shares Number"];

#[derive(Debug, Clone, PartialEq)]
pub struct ValueRoe {
    pub pb_max: f64,
    pub roe_min: f64,
}

impl Default for ValueRoe {
    fn default() -> Self {
        ValueRoe {
            pb_max: 1.5,
            roe_min: 0.10,
        }
    }
}

impl ValueRoe {
    pub fn from_params(params: &StrategyParams) -> Self {
        let defaults = ValueRoe::default();
        ValueRoe {
            pb_max: params.get_or("pb_max", defaults.pb_max),
            roe_min: params.get_or("roe_min", defaults.roe_min),
        }
    }

    fn metrics_for(&self, series: &AlignedSeries) -> MetricSeries {
        let rows = series.len();
        let equity_field = find_field(series, EQUITY_FIELDS, &[]);
        // Prefer a plain net income line over the "Common Stockholders" one.
        let income_field = find_field(series, INCOME_FIELDS, &["Common"])
            .or_else(|| find_field(series, INCOME_FIELDS, &[]));
        let shares_field = find_field(series, SHARES_FIELDS, &[]);

        let pb = match (equity_field, shares_field) {
            (Some(equity), Some(shares)) => {
                let bvps = ratio_column(&series.field_column(equity), &series.field_column(shares));
                series
                    .closes()
                    .iter()
                    .zip(&bvps)
                    .map(|(close, bv)| ratio(*close, *bv))
                    .collect()
            }
            _ => vec![f64::NAN; rows],
        };

        let roe = match (income_field, equity_field) {
            (Some(income), Some(equity)) => {
                ratio_column(&series.field_column(income), &series.field_column(equity))
            }
            _ => vec![f64::NAN; rows],
        };

        MetricSeries::for_series(series).with("pb", pb).with("roe", roe)
    }
}

pub fn create(params: &StrategyParams) -> Box<dyn Strategy> {
    Box::new(ValueRoe::from_params(params))
}

impl Strategy for ValueRoe {
    fn name(&self) -> &str {
        NAME
    }

    fn calculate_metrics(&self, aligned: &[AlignedSeries]) -> Vec<MetricSeries> {
        aligned.iter().map(|s| self.metrics_for(s)).collect()
    }

    fn generate_signals(&self, aligned: &[AlignedSeries]) -> Vec<SignalSeries> {
        self.calculate_metrics(aligned)
            .iter()
            .map(|m| {
                m.signals_where(|row| {
                    m.value("pb", row) < self.pb_max && m.value("roe", row) > self.roe_min
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alignment::align;
    use crate::domain::fundamental::FundamentalRecord;
    use crate::domain::price::PriceBar;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bars(closes: &[(NaiveDate, f64)]) -> Vec<PriceBar> {
        closes.iter().map(|&(date, c)| PriceBar::new(date, c)).collect()
    }

    #[test]
    fn cheap_profitable_instrument_is_held() {
        // BVPS = 1000 / 100 = 10, close 12 => P/B 1.2; ROE = 200 / 1000 = 0.2.
        let record = FundamentalRecord::new(d(2023, 12, 31))
            .with_field("Stockholders Equity", 1000.0)
            .with_field("Net Income", 200.0)
            .with_field("Ordinary Shares Number", 100.0);
        let series = align("AAA", &bars(&[(d(2024, 3, 1), 12.0), (d(2024, 3, 4), 20.0)]), &[record], 60);

        let metrics = ValueRoe::default().calculate_metrics(&[series.clone()]);
        assert!((metrics[0].value("pb", 0) - 1.2).abs() < 1e-12);
        assert!((metrics[0].value("roe", 0) - 0.2).abs() < 1e-12);

        let signals = ValueRoe::default().generate_signals(&[series]);
        assert_eq!(signals.len(), 1);
        // Second day P/B = 2.0, above the threshold.
        assert_eq!(signals[0].points[0].value, 1.0);
        assert_eq!(signals[0].points[1].value, 0.0);
    }

    #[test]
    fn nothing_published_yet_means_no_position() {
        let record = FundamentalRecord::new(d(2024, 3, 31))
            .with_field("Stockholders Equity", 1000.0)
            .with_field("Net Income", 200.0)
            .with_field("Ordinary Shares Number", 100.0);
        let price_bars = bars(&[(d(2024, 4, 1), 5.0), (d(2024, 7, 1), 5.0)]);
        let series = align("AAA", &price_bars, &[record], 60);
        let signals = ValueRoe::default().generate_signals(&[series]);
        // Published 2024-05-30: flat before, held after.
        assert_eq!(signals[0].points[0].value, 0.0);
        assert_eq!(signals[0].points[1].value, 1.0);
    }

    #[test]
    fn zero_equity_never_signals() {
        let record = FundamentalRecord::new(d(2023, 12, 31))
            .with_field("Total Stockholder Equity", 0.0)
            .with_field("Net Income", 200.0)
            .with_field("Share Issued", 100.0);
        let series = align("AAA", &bars(&[(d(2024, 3, 1), 12.0)]), &[record], 60);
        let metrics = ValueRoe::default().calculate_metrics(&[series.clone()]);
        assert!(metrics[0].value("pb", 0).is_nan());
        assert!(metrics[0].value("roe", 0).is_nan());
        let signals = ValueRoe::default().generate_signals(&[series]);
        assert_eq!(signals[0].points[0].value, 0.0);
    }

    #[test]
    fn price_only_series_is_flat() {
        let series = align("AAA", &bars(&[(d(2024, 3, 1), 12.0)]), &[], 60);
        let signals = ValueRoe::default().generate_signals(&[series]);
        assert_eq!(signals[0].points[0].value, 0.0);
    }

    #[test]
    fn parameters_override_thresholds() {
        let params = StrategyParams::new().with("pb_max", 3.0).with("roe_min", 0.5);
        let s = ValueRoe::from_params(&params);
        assert_eq!(s.pb_max, 3.0);
        assert_eq!(s.roe_min, 0.5);
    }
}
