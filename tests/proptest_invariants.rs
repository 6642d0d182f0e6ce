//! Property-based tests for simulator invariants.
//!
//! Random but well-formed OHLC series are pushed through the signal generator
//! and simulator; the properties below must hold for every one of them.

use chrono::{Days, NaiveDate};
use kisbook::{DailyBar, FEE, PriceSeries, backtest, generate_signals, simulate};
use proptest::prelude::*;

/// One bar as (open, high, low, close) with `low <= open, close <= high`.
fn bar_strategy() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (10.0f64..500.0, 0.0f64..0.2, 0.0f64..1.0, 0.0f64..1.0).prop_map(|(low, spread, o, c)| {
        let high = low * (1.0 + spread);
        let open = (low + (high - low) * o).min(high);
        let close = (low + (high - low) * c).min(high);
        (open, high, low, close)
    })
}

fn series_strategy(max_len: usize) -> impl Strategy<Value = PriceSeries> {
    prop::collection::vec(bar_strategy(), 1..max_len).prop_map(|ohlc| {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let bars = ohlc
            .into_iter()
            .enumerate()
            .map(|(i, (o, h, l, c))| DailyBar::new(start + Days::new(i as u64), o, h, l, c))
            .collect();
        PriceSeries::new(bars).unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // DRAWDOWN
    // ========================================================================

    /// dd is never negative and is zero exactly at a running peak
    #[test]
    fn drawdown_nonnegative_and_zero_at_peak(series in series_strategy(80)) {
        let bt = backtest(&series).unwrap();
        let mut peak = f64::MIN;
        for row in &bt.rows {
            prop_assert!(row.dd >= 0.0, "negative dd {} on {}", row.dd, row.date());
            if row.hpr >= peak {
                prop_assert_eq!(row.dd, 0.0);
                peak = row.hpr;
            }
        }
    }

    // ========================================================================
    // COMPOUNDING
    // ========================================================================

    /// hpr is the running product of ror, and the ratio recovers ror
    #[test]
    fn hpr_is_running_product(series in series_strategy(80)) {
        let bt = backtest(&series).unwrap();
        let mut product = 1.0;
        for (i, row) in bt.rows.iter().enumerate() {
            product *= row.ror;
            prop_assert!((row.hpr - product).abs() <= 1e-9 * product.abs().max(1.0));
            if i > 0 {
                let prev = bt.rows[i - 1].hpr;
                prop_assert!((row.hpr / prev - row.ror).abs() < 1e-9);
            }
        }
    }

    /// Days without an entry are exactly neutral
    #[test]
    fn flat_days_are_neutral(series in series_strategy(80)) {
        let bt = backtest(&series).unwrap();
        for row in &bt.rows {
            if !row.signal.entry {
                prop_assert_eq!(row.ror, 1.0);
            } else {
                let target = row.signal.target.unwrap();
                prop_assert!((row.ror - (row.signal.bar.close / target - FEE)).abs() < 1e-12);
            }
        }
    }

    // ========================================================================
    // SIGNALS
    // ========================================================================

    /// Entry implies both the breakout and the trend condition
    #[test]
    fn entry_requires_both_conditions(series in series_strategy(80)) {
        for row in generate_signals(&series) {
            let breakout = row.target.is_some_and(|t| row.bar.high > t);
            let trend = row.bull == Some(true);
            prop_assert_eq!(row.entry, breakout && trend);
        }
    }

    /// The first five rows never carry a trend signal
    #[test]
    fn warmup_rows_are_undefined(series in series_strategy(40)) {
        let rows = generate_signals(&series);
        for row in rows.iter().take(5) {
            prop_assert!(row.ma5.is_none());
            prop_assert!(row.bull.is_none());
            prop_assert!(!row.entry);
        }
        prop_assert!(rows[0].target.is_none());
    }

    /// noise20 is one value for the whole series
    #[test]
    fn noise20_is_constant(series in series_strategy(60)) {
        let rows = generate_signals(&series);
        let first = rows[0].noise20;
        prop_assert!(rows.iter().all(|r| r.noise20 == first));
        if rows.len() < 21 {
            prop_assert!(first.is_none());
        }
    }

    // ========================================================================
    // ALL-FLAT SERIES
    // ========================================================================

    /// A series that never breaks out keeps hpr at 1 and dd at 0
    #[test]
    fn no_breakout_no_change(price in 10.0f64..500.0, len in 1usize..60) {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let bars = (0..len)
            .map(|i| DailyBar::new(start + Days::new(i as u64), price, price, price, price))
            .collect();
        let rows = generate_signals(&PriceSeries::new(bars).unwrap());
        let bt = simulate(rows).unwrap();
        prop_assert!(bt.rows.iter().all(|r| r.hpr == 1.0 && r.dd == 0.0));
    }
}
