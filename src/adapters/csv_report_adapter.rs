//! CSV report adapter implementing ReportPort.
//!
//! For an output path `out/equity.csv` it writes:
//! - `out/equity.csv`: `date,equity`
//! - `out/equity_trades.csv`: `date,code,side,shares,price,commission`
//! - `out/equity_monthly.csv`: `year,month,return_pct`, compounded daily returns
//! - `out/equity_summary.csv`: `metric,value`, only when metrics are given

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FundtraderError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::portfolio::EquityPoint;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    metric: &'a str,
    value: String,
}

/// Compounded return per calendar month, in percent, keyed by the month of
/// the later point of each daily step.
pub fn compute_monthly_returns(equity_curve: &[EquityPoint]) -> Vec<MonthlyReturn> {
    let mut log_sums: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for window in equity_curve.windows(2) {
        let (prev, curr) = (&window[0], &window[1]);
        let step = if prev.equity > 0.0 && curr.equity > 0.0 {
            (curr.equity / prev.equity).ln()
        } else {
            0.0
        };
        *log_sums
            .entry((curr.date.year(), curr.date.month()))
            .or_default() += step;
    }

    log_sums
        .into_iter()
        .map(|((year, month), log_sum)| MonthlyReturn {
            year,
            month,
            return_pct: (log_sum.exp() - 1.0) * 100.0,
        })
        .collect()
}

/// `equity.csv` + `trades` gives `equity_trades.csv` beside it.
pub fn sibling_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output.with_file_name(format!("{}_{}.csv", stem, suffix))
}

fn csv_err(path: &Path, e: csv::Error) -> FundtraderError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => FundtraderError::Io(io),
        other => FundtraderError::Io(std::io::Error::other(format!(
            "failed to write {}: {:?}",
            path.display(),
            other
        ))),
    }
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: &[T],
    header: &[&str],
) -> Result<(), FundtraderError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    // serde only emits a header with the first row; empty reports still get one.
    if rows.is_empty() {
        writer.write_record(header).map_err(|e| csv_err(path, e))?;
    }
    for row in rows {
        writer.serialize(row).map_err(|e| csv_err(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

fn summary_rows<'a>(
    result: &'a BacktestResult,
    metrics: &PerformanceMetrics,
) -> Vec<SummaryRow<'a>> {
    let mut rows = vec![
        SummaryRow {
            metric: "strategy",
            value: result.strategy.clone(),
        },
        SummaryRow {
            metric: "instruments",
            value: result.codes.len().to_string(),
        },
        SummaryRow {
            metric: "rebalances",
            value: result.simulation.rebalance_count.to_string(),
        },
        SummaryRow {
            metric: "trades",
            value: result.simulation.fills.len().to_string(),
        },
    ];
    if let Some(final_equity) = result.final_equity() {
        rows.push(SummaryRow {
            metric: "final_equity",
            value: format!("{:.2}", final_equity),
        });
    }
    for (metric, value) in [
        ("cagr", metrics.cagr),
        ("max_drawdown", metrics.max_drawdown),
        ("sharpe_ratio", metrics.sharpe_ratio),
        ("total_return", metrics.total_return),
    ] {
        rows.push(SummaryRow {
            metric,
            value: format!("{:.6}", value),
        });
    }
    rows.push(SummaryRow {
        metric: "max_drawdown_duration",
        value: metrics.max_drawdown_duration.to_string(),
    });
    rows.push(SummaryRow {
        metric: "trading_days",
        value: metrics.trading_days.to_string(),
    });
    rows
}

pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: Option<&PerformanceMetrics>,
        output_path: &str,
    ) -> Result<(), FundtraderError> {
        let output = Path::new(output_path);
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        write_rows(output, result.equity_curve(), &["date", "equity"])?;
        write_rows(
            &sibling_path(output, "trades"),
            &result.simulation.fills,
            &["date", "code", "side", "shares", "price", "commission"],
        )?;
        write_rows(
            &sibling_path(output, "monthly"),
            &compute_monthly_returns(result.equity_curve()),
            &["year", "month", "return_pct"],
        )?;
        if let Some(metrics) = metrics {
            write_rows(
                &sibling_path(output, "summary"),
                &summary_rows(result, metrics),
                &["metric", "value"],
            )?;
        }

        tracing::info!(
            output = output_path,
            points = result.equity_curve().len(),
            trades = result.simulation.fills.len(),
            "report written"
        );
        Ok(())
    }
}
