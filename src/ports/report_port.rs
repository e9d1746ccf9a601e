//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FundtraderError;
use crate::domain::metrics::PerformanceMetrics;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: Option<&PerformanceMetrics>,
        output_path: &str,
    ) -> Result<(), FundtraderError>;
}
