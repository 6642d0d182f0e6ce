//! Core types: DailyBar, PriceSeries

use chrono::NaiveDate;

use crate::error::{DataIntegrityError, Result};

/// One trading day of open/high/low/close prices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl DailyBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// `high - low`.
    #[inline]
    pub fn spread(&self) -> f64 {
        self.high - self.low
    }

    /// Check the bar's own fields: finite, positive, `low <= open, close <= high`.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(DataIntegrityError::NonFinite {
                    date: self.date,
                    field,
                });
            }
            if value <= 0.0 {
                return Err(DataIntegrityError::NonPositive {
                    date: self.date,
                    field,
                    value,
                });
            }
        }

        if self.high < self.low {
            return Err(DataIntegrityError::InvertedRange {
                date: self.date,
                high: self.high,
                low: self.low,
            });
        }

        for (field, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low || value > self.high {
                return Err(DataIntegrityError::OutOfRange {
                    date: self.date,
                    field,
                    value,
                    low: self.low,
                    high: self.high,
                });
            }
        }
        Ok(())
    }
}

/// A validated daily price series, strictly ascending by date.
///
/// Non-trading days are simply absent; no gap filling is done.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PriceSeries {
    bars: Vec<DailyBar>,
}

impl PriceSeries {
    /// Build a series from bars already sorted ascending by date.
    ///
    /// Fails on empty input, malformed bars, and duplicate or out-of-order
    /// dates.
    pub fn new(bars: Vec<DailyBar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(DataIntegrityError::Empty);
        }
        for bar in &bars {
            bar.validate()?;
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(DataIntegrityError::Unordered {
                    previous: pair[0].date,
                    date: pair[1].date,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Sort bars by date, then validate as [`PriceSeries::new`].
    ///
    /// Duplicate dates are still rejected.
    pub fn from_unordered(mut bars: Vec<DailyBar>) -> Result<Self> {
        bars.sort_by_key(|b| b.date);
        Self::new(bars)
    }

    #[inline]
    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    /// Number of bars; at least one.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn into_bars(self) -> Vec<DailyBar> {
        self.bars
    }
}

impl<'a> IntoIterator for &'a PriceSeries {
    type Item = &'a DailyBar;
    type IntoIter = std::slice::Iter<'a, DailyBar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
