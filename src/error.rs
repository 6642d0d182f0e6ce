//! Data integrity errors for price series and backtest results.

use chrono::NaiveDate;

/// Malformed, empty, or inconsistent price data.
///
/// Raised eagerly by [`PriceSeries`](crate::PriceSeries) construction and by
/// the simulator, so that bad input never turns into NaN-poisoned `hpr`/`dd`
/// values downstream.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DataIntegrityError {
    /// The series contains no bars.
    #[error("price series is empty")]
    Empty,

    /// A price field is NaN or infinite.
    #[error("{date}: {field} is not a finite number")]
    NonFinite { date: NaiveDate, field: &'static str },

    /// A price field is zero or negative.
    #[error("{date}: {field} must be positive, got {value}")]
    NonPositive {
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },

    /// `high < low`.
    #[error("{date}: high {high} is below low {low}")]
    InvertedRange { date: NaiveDate, high: f64, low: f64 },

    /// `open` or `close` lies outside `[low, high]`.
    #[error("{date}: {field} {value} outside [{low}, {high}]")]
    OutOfRange {
        date: NaiveDate,
        field: &'static str,
        value: f64,
        low: f64,
        high: f64,
    },

    /// Dates are duplicated or not strictly ascending.
    #[error("{date} does not follow {previous}")]
    Unordered { previous: NaiveDate, date: NaiveDate },

    /// The simulator produced a non-finite or non-positive return.
    #[error("{date}: simulated {field} is {value}")]
    NonFiniteResult {
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, DataIntegrityError>;
