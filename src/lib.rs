//! # kisbook
//!
//! A volatility-breakout backtest engine over daily open/high/low/close series.
//!
//! ## The rule
//!
//! On day *t* the strategy goes long when the intraday high breaks above
//! `open[t] + (high[t-1] - low[t-1]) / 2`, but only if `open[t]` is above the
//! mean of the five previous closes. Entry is at that breakout target, exit at
//! the same day's close, and every trade pays a fixed 5 bps round-trip fee.
//!
//! ## Quick Start
//!
//! ```
//! use chrono::{Days, NaiveDate};
//! use kisbook::{DailyBar, PriceSeries, generate_signals, simulate};
//!
//! let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
//! let mut bars: Vec<DailyBar> = (0..5)
//!     .map(|i| DailyBar::new(start + Days::new(i), 100.0, 102.0, 98.0, 100.0))
//!     .collect();
//! bars.push(DailyBar::new(start + Days::new(5), 101.0, 106.0, 100.0, 105.0));
//!
//! let series = PriceSeries::new(bars).unwrap();
//! let rows = generate_signals(&series);
//! assert!(rows[5].entry);
//!
//! let bt = simulate(rows).unwrap();
//! assert!((bt.final_hpr() - (105.0 / 103.0 - 0.0005)).abs() < 1e-12);
//! assert_eq!(bt.max_drawdown(), 0.0);
//! ```
//!
//! ## Bad data
//!
//! Malformed bars are rejected when the series is built, not discovered later
//! as NaN in the results:
//!
//! ```
//! use chrono::NaiveDate;
//! use kisbook::{DailyBar, DataIntegrityError, PriceSeries};
//!
//! let d = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
//! let err = PriceSeries::new(vec![DailyBar::new(d, 100.0, 95.0, 110.0, 100.0)]).unwrap_err();
//! assert!(matches!(err, DataIntegrityError::InvertedRange { .. }));
//! ```

pub mod batch;
mod error;
pub mod indicators;
pub mod metrics;
pub mod signals;
pub mod simulate;
mod types;

pub use error::{DataIntegrityError, Result};
pub use metrics::{TradeStats, trade_stats};
pub use signals::{IndicatorRow, generate_signals};
pub use simulate::{Backtest, BacktestRow, FEE, backtest, simulate, simulate_with_fee};
pub use types::{DailyBar, PriceSeries};
