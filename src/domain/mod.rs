//! Core domain types and logic.

pub mod alignment;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod fundamental;
pub mod metrics;
pub mod portfolio;
pub mod price;
pub mod schedule;
pub mod signal;
pub mod simulation;
pub mod strategy;
pub mod universe;
