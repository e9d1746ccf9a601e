//! fundtrader: fundamental-data portfolio backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command line in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;

pub use domain::backtest::{run_backtest, BacktestConfig, BacktestResult, Backtester};
pub use domain::error::FundtraderError;
pub use domain::metrics::{analyze_performance, PerformanceMetrics};
