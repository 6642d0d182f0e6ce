//! Signal generator for the volatility-breakout rule.
//!
//! For each day the rule enters long when the intraday high breaks above
//! `open + half of the prior day's range`, but only if the open is above the
//! 5-day moving average of prior closes. Entry is assumed at the breakout
//! target and exit at the same day's close.

use crate::indicators::{half_range, lag, noise_ratio, sma, window_mean};
use crate::types::{DailyBar, PriceSeries};

/// Trailing window of closes behind `ma5`.
pub const MA_PERIOD: usize = 5;

/// Window of the `noise20` average.
pub const NOISE_PERIOD: usize = 20;

/// Minimum number of bars before any day can carry a defined signal.
pub const MIN_SIGNAL_BARS: usize = MA_PERIOD + 1;

/// One day's derived indicator fields, aligned with its bar.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndicatorRow {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub bar: DailyBar,
    /// Mean close of the 5 bars strictly before this one.
    pub ma5: Option<f64>,
    /// Same-day noise ratio; `None` on a zero-range bar.
    pub noise: Option<f64>,
    /// Series-wide scalar, see [`generate_signals`].
    pub noise20: Option<f64>,
    /// Half of the prior day's high-low range.
    pub range: Option<f64>,
    /// Breakout trigger: `open + range`.
    pub target: Option<f64>,
    /// `open > ma5`.
    pub bull: Option<bool>,
    /// Both breakout and trend conditions hold.
    pub entry: bool,
}

impl IndicatorRow {
    /// Entry price when the rule triggers.
    pub fn entry_price(&self) -> Option<f64> {
        if self.entry { self.target } else { None }
    }
}

/// Derive indicator columns and entry decisions for every bar.
///
/// Series shorter than [`MIN_SIGNAL_BARS`] produce rows whose signal fields
/// are all undefined; this is not an error.
///
/// `noise20` is a single value copied onto every row: the mean noise of the
/// 20 bars ending at the second-to-last bar of the whole series. It is not a
/// rolling column. Downstream output depends on this anchoring, and nothing
/// in the entry decision reads it.
pub fn generate_signals(series: &PriceSeries) -> Vec<IndicatorRow> {
    let bars = series.bars();
    let n = bars.len();

    let closes = series.closes();
    let ma5 = lag(&sma(&closes, MA_PERIOD), 1);

    let noise: Vec<Option<f64>> = bars.iter().map(noise_ratio).collect();
    let noise20 = n
        .checked_sub(2)
        .and_then(|anchor| window_mean(&noise, anchor, NOISE_PERIOD));

    let half: Vec<Option<f64>> = bars.iter().map(|b| Some(half_range(b))).collect();
    let range = lag(&half, 1);

    bars.iter()
        .enumerate()
        .map(|(t, bar)| {
            let target = range[t].map(|r| bar.open + r);
            let bull = ma5[t].map(|m| bar.open > m);
            let breakout = target.is_some_and(|tg| bar.high > tg);
            IndicatorRow {
                bar: *bar,
                ma5: ma5[t],
                noise: noise[t],
                noise20,
                range: range[t],
                target,
                bull,
                entry: breakout && bull == Some(true),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn day(i: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Days::new(i)
    }

    fn series(ohlc: &[(f64, f64, f64, f64)]) -> PriceSeries {
        let bars = ohlc
            .iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| DailyBar::new(day(i as u64), o, h, l, c))
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    #[test]
    fn two_bar_series_has_no_signal() {
        let rows = generate_signals(&series(&[
            (100.0, 110.0, 95.0, 108.0),
            (109.0, 120.0, 105.0, 115.0),
        ]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].range, None);
        assert_eq!(rows[0].target, None);
        assert_eq!(rows[1].range, Some(7.5));
        assert_eq!(rows[1].target, Some(116.5));
        // breakout holds (120 > 116.5) but the trend filter is undefined
        assert_eq!(rows[1].bull, None);
        assert!(!rows[1].entry);
        assert_eq!(rows[1].noise20, None);
    }

    #[test]
    fn sixth_bar_triggers() {
        let rows = generate_signals(&series(&[
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (101.0, 106.0, 100.0, 105.0),
        ]));
        assert!(rows[..5].iter().all(|r| r.ma5.is_none() && !r.entry));
        let last = rows[5];
        assert_eq!(last.ma5, Some(100.0));
        assert_eq!(last.bull, Some(true));
        assert_eq!(last.target, Some(103.0));
        assert!(last.entry);
        assert_eq!(last.entry_price(), Some(103.0));
    }

    #[test]
    fn bear_open_blocks_entry() {
        let rows = generate_signals(&series(&[
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 102.0, 98.0, 100.0),
            (99.0, 110.0, 98.0, 105.0),
        ]));
        assert_eq!(rows[5].bull, Some(false));
        assert!(rows[5].high_breaks_target());
        assert!(!rows[5].entry);
    }

    #[test]
    fn zero_range_bar_has_undefined_noise() {
        let rows = generate_signals(&series(&[
            (100.0, 100.0, 100.0, 100.0),
            (100.0, 104.0, 99.0, 103.0),
        ]));
        assert_eq!(rows[0].noise, None);
        assert_eq!(rows[1].range, Some(0.0));
        assert_eq!(rows[1].target, Some(100.0));
    }

    #[test]
    fn noise20_anchors_at_second_to_last_bar() {
        // 22 bars: noise is 1.0 for bars 0..=20 except bar 21, which is 0.0
        let mut ohlc = vec![(100.0, 110.0, 90.0, 100.0); 21];
        ohlc.push((90.0, 110.0, 90.0, 110.0));
        let rows = generate_signals(&series(&ohlc));
        assert_eq!(rows[21].noise, Some(0.0));
        // window is bars 1..=20, so the last bar's 0.0 is excluded
        assert!(rows.iter().all(|r| r.noise20 == Some(1.0)));
    }

    #[test]
    fn noise20_undefined_when_series_short() {
        let ohlc = vec![(100.0, 110.0, 90.0, 100.0); 20];
        let rows = generate_signals(&series(&ohlc));
        assert!(rows.iter().all(|r| r.noise20.is_none()));
    }

    impl IndicatorRow {
        fn high_breaks_target(&self) -> bool {
            self.target.is_some_and(|t| self.bar.high > t)
        }
    }
}
