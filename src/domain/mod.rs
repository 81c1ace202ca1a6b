//! Core domain types and logic.

pub mod ohlcv;
pub mod calendar;
pub mod instrument;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod risk;
pub mod run_result;
pub mod optimize;
pub mod orchestrator;
pub mod config_validation;
pub mod error;
