//! Multi-factor quality screen.
//!
//! Five conditions are computed for every row:
//!
//! 1. market cap (`close * shares`) below `max_market_cap`
//! 2. free cash flow (operating cash flow + capital expenditure) above zero
//! 3. ROE above `min_roe`
//! 4. operating income growth over 252 rows, in percent, above `min_growth`
//! 5. price-to-sales below `max_ps`
//!
//! `multi_factor` holds on the first three; `multi_factor_full` requires all
//! five.

use super::{ratio, ratio_column, MetricSeries, Strategy, StrategyParams};
use crate::domain::alignment::AlignedSeries;
use crate::domain::signal::SignalSeries;

pub const NAME: &str = "multi_factor";
pub const FULL_NAME: &str = "multi_factor_full";
pub const PARAMETERS: &[&str] = &["max_market_cap", "min_roe"];
pub const FULL_PARAMETERS: &[&str] = &["max_market_cap", "min_roe", "min_growth", "max_ps"];

/// Rows between an operating income value and its year-ago comparison.
pub const GROWTH_LOOKBACK: usize = 252;

const SHARES: &str = "Ordinary Shares Number";
const OPERATING_CASH_FLOW: &str = "Operating Cash Flow";
const CAPITAL_EXPENDITURE: &str = "Capital Expenditure";
const NET_INCOME: &str = "Net Income";
const EQUITY: &str = "Stockholders Equity";
const OPERATING_INCOME: &str = "Operating Income";
const TOTAL_REVENUE: &str = "Total Revenue";
const REVENUE: &str = "Revenue";

#[derive(Debug, Clone, PartialEq)]
pub struct MultiFactor {
    pub max_market_cap: f64,
    pub min_roe: f64,
    pub min_growth: f64,
    pub max_ps: f64,
    /// Also require the growth and price-to-sales conditions.
    pub full: bool,
}

impl Default for MultiFactor {
    fn default() -> Self {
        MultiFactor {
            max_market_cap: 1e12,
            min_roe: 0.05,
            min_growth: 0.0,
            max_ps: 50.0,
            full: false,
        }
    }
}

impl MultiFactor {
    pub fn from_params(params: &StrategyParams) -> Self {
        let defaults = MultiFactor::default();
        MultiFactor {
            max_market_cap: params.get_or("max_market_cap", defaults.max_market_cap),
            min_roe: params.get_or("min_roe", defaults.min_roe),
            min_growth: params.get_or("min_growth", defaults.min_growth),
            max_ps: params.get_or("max_ps", defaults.max_ps),
            full: false,
        }
    }

    pub fn full_from_params(params: &StrategyParams) -> Self {
        MultiFactor {
            full: true,
            ..MultiFactor::from_params(params)
        }
    }

    fn metrics_for(&self, series: &AlignedSeries) -> Option<MetricSeries> {
        if !series.has_field(SHARES) {
            return None;
        }

        let closes = series.closes();
        let shares = series.field_column(SHARES);
        let market_cap: Vec<f64> = closes
            .iter()
            .zip(&shares)
            .map(|(c, s)| if *s == 0.0 { f64::NAN } else { c * s })
            .collect();

        // Capital expenditure is reported as a negative outflow.
        let free_cash_flow: Vec<f64> = series
            .field_column(OPERATING_CASH_FLOW)
            .iter()
            .zip(series.field_column(CAPITAL_EXPENDITURE))
            .map(|(ocf, capex)| ocf + capex)
            .collect();

        let roe = ratio_column(
            &series.field_column(NET_INCOME),
            &series.field_column(EQUITY),
        );

        let operating_income = series.field_column(OPERATING_INCOME);
        let growth: Vec<f64> = (0..operating_income.len())
            .map(|i| match i.checked_sub(GROWTH_LOOKBACK) {
                Some(prev) => (ratio(operating_income[i], operating_income[prev]) - 1.0) * 100.0,
                None => f64::NAN,
            })
            .collect();

        let revenue_field = if series.has_field(TOTAL_REVENUE) {
            TOTAL_REVENUE
        } else {
            REVENUE
        };
        let price_to_sales = ratio_column(&market_cap, &series.field_column(revenue_field));

        Some(
            MetricSeries::for_series(series)
                .with("market_cap", market_cap)
                .with("free_cash_flow", free_cash_flow)
                .with("roe", roe)
                .with("operating_income_growth", growth)
                .with("price_to_sales", price_to_sales),
        )
    }

    fn holds(&self, m: &MetricSeries, row: usize) -> bool {
        let core = m.value("market_cap", row) < self.max_market_cap
            && m.value("free_cash_flow", row) > 0.0
            && m.value("roe", row) > self.min_roe;
        if !self.full {
            return core;
        }
        core && m.value("operating_income_growth", row) > self.min_growth
            && m.value("price_to_sales", row) < self.max_ps
    }
}

pub fn create(params: &StrategyParams) -> Box<dyn Strategy> {
    Box::new(MultiFactor::from_params(params))
}

pub fn create_full(params: &StrategyParams) -> Box<dyn Strategy> {
    Box::new(MultiFactor::full_from_params(params))
}

impl Strategy for MultiFactor {
    fn name(&self) -> &str {
        if self.full { FULL_NAME } else { NAME }
    }

    fn calculate_metrics(&self, aligned: &[AlignedSeries]) -> Vec<MetricSeries> {
        aligned.iter().filter_map(|s| self.metrics_for(s)).collect()
    }

    fn generate_signals(&self, aligned: &[AlignedSeries]) -> Vec<SignalSeries> {
        self.calculate_metrics(aligned)
            .iter()
            .map(|m| m.signals_where(|row| self.holds(m, row)))
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

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn healthy_record() -> FundamentalRecord {
        FundamentalRecord::new(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
            .with_field(SHARES, 1_000.0)
            .with_field(OPERATING_CASH_FLOW, 500.0)
            .with_field(CAPITAL_EXPENDITURE, -200.0)
            .with_field(NET_INCOME, 100.0)
            .with_field(EQUITY, 1_000.0)
            .with_field(OPERATING_INCOME, 150.0)
            .with_field(TOTAL_REVENUE, 2_000.0)
    }

    fn series(days: usize, record: FundamentalRecord) -> AlignedSeries {
        let bars: Vec<_> = (0..days)
            .map(|i| PriceBar::new(start() + chrono::Duration::days(i as i64), 10.0))
            .collect();
        align("AAA", &bars, &[record], 60)
    }

    #[test]
    fn three_condition_variant_holds() {
        let s = series(3, healthy_record());
        let signals = MultiFactor::default().generate_signals(&[s]);
        assert!(signals[0].points.iter().all(|p| p.value == 1.0));
    }

    #[test]
    fn full_variant_needs_growth_history() {
        // Fewer than 252 rows: growth is undefined, so the full screen fails.
        let s = series(3, healthy_record());
        let full = MultiFactor::full_from_params(&StrategyParams::new());
        assert_eq!(full.name(), FULL_NAME);
        let signals = full.generate_signals(&[s]);
        assert!(signals[0].points.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn full_variant_with_growth() {
        let bars: Vec<PriceBar> = (0..300)
            .map(|i| PriceBar::new(start() + chrono::Duration::days(i), 10.0))
            .collect();
        let old = healthy_record();
        let newer = FundamentalRecord::new(start() + chrono::Duration::days(100))
            .with_field(OPERATING_INCOME, 300.0)
            .with_field(SHARES, 1_000.0)
            .with_field(OPERATING_CASH_FLOW, 500.0)
            .with_field(CAPITAL_EXPENDITURE, -200.0)
            .with_field(NET_INCOME, 100.0)
            .with_field(EQUITY, 1_000.0)
            .with_field(TOTAL_REVENUE, 2_000.0);
        let s = align("AAA", &bars, &[old, newer], 60);
        let full = MultiFactor::full_from_params(&StrategyParams::new());

        let m = &full.calculate_metrics(&[s.clone()])[0];
        // Row 252 sees the newer record against the old one: 300 / 150 - 1 = 100%.
        assert!((m.value("operating_income_growth", 252) - 100.0).abs() < 1e-9);
        assert!((m.value("price_to_sales", 252) - 5.0).abs() < 1e-12);

        let signals = full.generate_signals(&[s]);
        assert_eq!(signals[0].points[251].value, 0.0);
        assert_eq!(signals[0].points[252].value, 1.0);
    }

    #[test]
    fn negative_free_cash_flow_fails() {
        let record = healthy_record().with_field(CAPITAL_EXPENDITURE, -900.0);
        let signals = MultiFactor::default().generate_signals(&[series(2, record)]);
        assert!(signals[0].points.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn missing_cash_flow_fails_rather_than_defaulting() {
        let mut record = healthy_record();
        record.fields.remove(OPERATING_CASH_FLOW);
        let signals = MultiFactor::default().generate_signals(&[series(2, record)]);
        assert!(signals[0].points.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn market_cap_cap_applies() {
        let params = StrategyParams::new().with("max_market_cap", 5_000.0);
        let signals =
            MultiFactor::from_params(&params).generate_signals(&[series(2, healthy_record())]);
        // Market cap 10 * 1000 = 10000.
        assert!(signals[0].points.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn revenue_fallback_field() {
        let mut record = healthy_record();
        record.fields.remove(TOTAL_REVENUE);
        let record = record.with_field(REVENUE, 4_000.0);
        let m = &MultiFactor::default().calculate_metrics(&[series(1, record)])[0];
        assert!((m.value("price_to_sales", 0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn no_shares_field_skips_instrument() {
        let mut record = healthy_record();
        record.fields.remove(SHARES);
        assert!(MultiFactor::default().generate_signals(&[series(2, record)]).is_empty());
    }
}
