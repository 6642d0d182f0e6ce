//! Trade statistics over a simulated backtest.

use crate::simulate::BacktestRow;

/// Headline statistics of one backtest.
///
/// Drawdown is not repeated here; it lives on the rows (`dd`, percent).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeStats {
    /// Days the rule entered.
    pub trades: usize,
    /// Entry days closing above the target after the fee (`ror > 1`).
    pub wins: usize,
    /// Compound annual growth of the final `hpr`.
    pub cagr: f64,
    /// Annualized mean / sample std of `ror - 1` over every day.
    pub sharpe: f64,
}

impl TradeStats {
    /// Share of trades that made money; 0 without trades.
    pub fn hit_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }
}

/// Statistics over `rows`; `None` when there are none.
///
/// `periods_per_year` annualizes both CAGR and Sharpe (252 for trading days).
pub fn trade_stats(rows: &[BacktestRow], periods_per_year: f64) -> Option<TradeStats> {
    let last = rows.last()?;
    let n = rows.len() as f64;

    let (trades, wins) = rows
        .iter()
        .filter(|r| r.signal.entry)
        .fold((0, 0), |(t, w), r| (t + 1, w + usize::from(r.ror > 1.0)));

    let years = n / periods_per_year;
    let cagr = if last.hpr <= 0.0 {
        -1.0
    } else if years > 0.0 {
        last.hpr.powf(1.0 / years) - 1.0
    } else {
        0.0
    };

    let mean = rows.iter().map(|r| r.ror - 1.0).sum::<f64>() / n;
    let std = if rows.len() < 2 {
        0.0
    } else {
        let ss: f64 = rows.iter().map(|r| (r.ror - 1.0 - mean).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    };
    let sharpe = if std > 0.0 {
        mean / std * periods_per_year.sqrt()
    } else {
        0.0
    };

    Some(TradeStats {
        trades,
        wins,
        cagr,
        sharpe,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::IndicatorRow;
    use crate::types::DailyBar;
    use chrono::{Days, NaiveDate};

    fn row(i: u64, entry: bool, ror: f64, hpr: f64) -> BacktestRow {
        let date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Days::new(i);
        BacktestRow {
            signal: IndicatorRow {
                bar: DailyBar::new(date, 100.0, 101.0, 99.0, 100.0),
                ma5: None,
                noise: None,
                noise20: None,
                range: None,
                target: None,
                bull: None,
                entry,
            },
            ror,
            hpr,
            dd: 0.0,
        }
    }

    #[test]
    fn empty_rows() {
        assert!(trade_stats(&[], 252.0).is_none());
    }

    #[test]
    fn flat_series() {
        let rows: Vec<_> = (0..30).map(|i| row(i, false, 1.0, 1.0)).collect();
        let s = trade_stats(&rows, 252.0).unwrap();
        assert_eq!(s.trades, 0);
        assert_eq!(s.cagr, 0.0);
        assert_eq!(s.sharpe, 0.0);
        assert_eq!(s.hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_counts_entry_days_only() {
        let rows = [
            row(0, false, 1.0, 1.0),
            row(1, true, 1.02, 1.02),
            row(2, true, 0.99, 1.0098),
            row(3, false, 1.0, 1.0098),
            row(4, true, 1.01, 1.019898),
        ];
        let s = trade_stats(&rows, 252.0).unwrap();
        assert_eq!(s.trades, 3);
        assert_eq!(s.wins, 2);
        assert!((s.hit_rate() - 2.0 / 3.0).abs() < 1e-12);
        assert!(s.sharpe > 0.0);
    }

    #[test]
    fn one_year_cagr_is_total_return() {
        let rows: Vec<_> = (0..12).map(|i| row(i, true, 1.01, 1.01f64.powi(i as i32 + 1))).collect();
        let s = trade_stats(&rows, 12.0).unwrap();
        assert!((s.cagr - (1.01f64.powi(12) - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn wipeout_clamps_cagr() {
        let rows = [row(0, true, 0.0, 0.0), row(1, false, 1.0, 0.0)];
        assert_eq!(trade_stats(&rows, 252.0).unwrap().cagr, -1.0);
    }
}
