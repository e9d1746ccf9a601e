//! Performance analyzer: CAGR, maximum drawdown and Sharpe ratio of an
//! equity curve.

use super::portfolio::EquityPoint;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Standard deviations at or below this are float noise on a constant-return
/// curve and count as zero volatility.
const MIN_STDDEV: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    pub cagr: f64,
    /// Worst peak-to-trough decline as a fraction, always `<= 0`.
    pub max_drawdown: f64,
    /// Longest run of consecutive points below a previous peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub total_return: f64,
    pub trading_days: usize,
}

/// Analyze an equity curve. Returns `None` for an empty curve.
pub fn analyze_performance(equity_curve: &[EquityPoint]) -> Option<PerformanceMetrics> {
    let first = equity_curve.first()?;
    let last = equity_curve.last()?;

    let total_return = if first.equity > 0.0 {
        last.equity / first.equity - 1.0
    } else {
        0.0
    };

    let days_elapsed = (last.date - first.date).num_days();
    let cagr = compute_cagr(first.equity, last.equity, days_elapsed);
    let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
    let sharpe_ratio = compute_sharpe(equity_curve);

    Some(PerformanceMetrics {
        cagr,
        max_drawdown,
        max_drawdown_duration,
        sharpe_ratio,
        total_return,
        trading_days: equity_curve.len(),
    })
}

fn compute_cagr(first: f64, last: f64, days_elapsed: i64) -> f64 {
    if days_elapsed <= 0 || first <= 0.0 {
        return 0.0;
    }
    let cagr = (last / first).powf(DAYS_PER_YEAR / days_elapsed as f64) - 1.0;
    if cagr.is_finite() { cagr } else { 0.0 }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
            continue;
        }
        current_duration += 1;
        max_duration = max_duration.max(current_duration);
        if peak > 0.0 {
            let dd = (point.equity - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    (max_dd, max_duration)
}

fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity != 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect()
}

fn compute_sharpe(equity_curve: &[EquityPoint]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > MIN_STDDEV {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}
