//! kisbook-dashboard: holdings, rebalancing suggestions and volatility
//! breakout backtests for a Korea Investment & Securities account.
//!
//! Reads a TOML config, connects to the KIS Open API through
//! `kisbook-broker`, and renders plain-text reports. Nothing here places
//! orders.

pub mod commands;
pub mod config;
pub mod error;
pub mod rebalance;
pub mod report;
pub mod target;
