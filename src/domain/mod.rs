//! Core domain types and logic.

pub mod price;
pub mod features;
pub mod scaler;
pub mod estimator;
pub mod evaluation;
pub mod pipeline;
pub mod portfolio;
pub mod backtest;
pub mod metrics;
pub mod batch;
pub mod config;
pub mod config_validation;
pub mod error;
