//! Core domain types and logic: indicators, analysis, fusion, sizing and the
//! position lifecycle.

pub mod account;
pub mod classifier;
pub mod config;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod features;
pub mod fusion;
pub mod indicator;
pub mod levels;
pub mod lifecycle;
pub mod ohlcv;
pub mod position;
pub mod risk;
pub mod scheduler;
pub mod sentiment;
pub mod session;
pub mod signal;
pub mod technical;
pub mod trend;
