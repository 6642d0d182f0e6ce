//! Return simulator: daily returns, holding-period return and drawdown.

use chrono::NaiveDate;

use crate::error::{DataIntegrityError, Result};
use crate::metrics::{TradeStats, trade_stats};
use crate::signals::{IndicatorRow, generate_signals};
use crate::types::PriceSeries;

/// Round-trip transaction cost subtracted once per triggered trade (5 bps).
pub const FEE: f64 = 0.0005;

/// Trading days per year, for annualizing metrics.
pub const TRADING_DAYS: f64 = 252.0;

/// An indicator row with its simulated outcome.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BacktestRow {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub signal: IndicatorRow,
    /// Daily return multiplier; exactly 1.0 on days without a trade.
    pub ror: f64,
    /// Running product of `ror` from the first bar.
    pub hpr: f64,
    /// Percent below the running peak of `hpr`.
    pub dd: f64,
}

impl BacktestRow {
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.signal.bar.date
    }
}

/// Simulated per-day series for one symbol.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Backtest {
    pub rows: Vec<BacktestRow>,
}

impl Backtest {
    /// Total compounded return multiplier (last `hpr`).
    pub fn final_hpr(&self) -> f64 {
        self.rows.last().map_or(1.0, |r| r.hpr)
    }

    /// Maximum drawdown over the series, in percent.
    pub fn max_drawdown(&self) -> f64 {
        self.rows.iter().map(|r| r.dd).fold(0.0, f64::max)
    }

    /// Number of days the rule traded.
    pub fn trades(&self) -> usize {
        self.rows.iter().filter(|r| r.signal.entry).count()
    }

    /// `hpr` column.
    pub fn hpr_series(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.hpr).collect()
    }

    /// Trade count, hit rate, CAGR and Sharpe; see [`trade_stats`].
    pub fn stats(&self, periods_per_year: f64) -> Option<TradeStats> {
        trade_stats(&self.rows, periods_per_year)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Simulate the rule with the default [`FEE`].
pub fn simulate(rows: Vec<IndicatorRow>) -> Result<Backtest> {
    simulate_with_fee(rows, FEE)
}

/// Simulate the rule with an explicit per-trade fee.
///
/// `ror = close / target - fee` on entry days and `1.0` otherwise. Fails on
/// empty input and on any non-finite or non-positive `ror`/`hpr`, so bad
/// numbers never reach the drawdown column.
pub fn simulate_with_fee(rows: Vec<IndicatorRow>, fee: f64) -> Result<Backtest> {
    if rows.is_empty() {
        return Err(DataIntegrityError::Empty);
    }

    let mut out = Vec::with_capacity(rows.len());
    let mut hpr = 1.0_f64;
    let mut peak = f64::MIN;

    for signal in rows {
        let date = signal.bar.date;
        let ror = match signal.entry_price() {
            Some(target) => signal.bar.close / target - fee,
            None => 1.0,
        };
        check_positive(date, "ror", ror)?;

        hpr *= ror;
        check_positive(date, "hpr", hpr)?;

        peak = peak.max(hpr);
        let dd = (peak - hpr) / peak * 100.0;

        out.push(BacktestRow {
            signal,
            ror,
            hpr,
            dd,
        });
    }

    Ok(Backtest { rows: out })
}

/// Generate signals and simulate them in one step.
pub fn backtest(series: &PriceSeries) -> Result<Backtest> {
    simulate(generate_signals(series))
}

fn check_positive(date: NaiveDate, field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DataIntegrityError::NonFiniteResult { date, field, value })
    }
}
