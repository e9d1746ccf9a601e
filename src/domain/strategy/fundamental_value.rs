//! Classic value screen: cheap on book or earnings, with positive returns.
//!
//! Holds while `(P/B < pb_max OR 0 < P/E < pe_max) AND ROE > roe_min`.
//! Disclosures are quarterly, so earnings and ROE are annualised by
//! multiplying the latest quarter by four.

use super::{ratio, MetricSeries, Strategy, StrategyParams};
use crate::domain::alignment::AlignedSeries;
use crate::domain::signal::SignalSeries;

pub const NAME: &str = "fundamental_value";
pub const PARAMETERS: &[&str] = &["pb_max", "pe_max", "roe_min"];

const EQUITY: &str = "Stockholders Equity";
const NET_INCOME: &str = "Net Income";
const SHARES: &str = "Ordinary Shares Number";
const QUARTERS_PER_YEAR: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalValue {
    pub pb_max: f64,
    pub pe_max: f64,
    pub roe_min: f64,
}

impl Default for FundamentalValue {
    fn default() -> Self {
        FundamentalValue {
            pb_max: 0.7,
            pe_max: 13.0,
            roe_min: 0.0,
        }
    }
}

impl FundamentalValue {
    pub fn from_params(params: &StrategyParams) -> Self {
        let defaults = FundamentalValue::default();
        FundamentalValue {
            pb_max: params.get_or("pb_max", defaults.pb_max),
            pe_max: params.get_or("pe_max", defaults.pe_max),
            roe_min: params.get_or("roe_min", defaults.roe_min),
        }
    }

    fn metrics_for(&self, series: &AlignedSeries) -> Option<MetricSeries> {
        if ![EQUITY, NET_INCOME, SHARES].iter().all(|f| series.has_field(f)) {
            return None;
        }

        let closes = series.closes();
        let equity = series.field_column(EQUITY);
        let income = series.field_column(NET_INCOME);
        let shares = series.field_column(SHARES);

        let mut pb = Vec::with_capacity(closes.len());
        let mut pe = Vec::with_capacity(closes.len());
        let mut roe = Vec::with_capacity(closes.len());
        for i in 0..closes.len() {
            let bvps = ratio(equity[i], shares[i]);
            pb.push(ratio(closes[i], bvps));

            let eps = ratio(income[i] * QUARTERS_PER_YEAR, shares[i]);
            pe.push(ratio(closes[i], eps));

            roe.push(ratio(income[i], equity[i]) * QUARTERS_PER_YEAR);
        }

        Some(
            MetricSeries::for_series(series)
                .with("pb", pb)
                .with("pe", pe)
                .with("roe", roe),
        )
    }

    fn holds(&self, m: &MetricSeries, row: usize) -> bool {
        let pe = m.value("pe", row);
        let cheap = m.value("pb", row) < self.pb_max || (pe > 0.0 && pe < self.pe_max);
        cheap && m.value("roe", row) > self.roe_min
    }
}

pub fn create(params: &StrategyParams) -> Box<dyn Strategy> {
    Box::new(FundamentalValue::from_params(params))
}

impl Strategy for FundamentalValue {
    fn name(&self) -> &str {
        NAME
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
