//! Daily price history retrieval with backward pagination.
//!
//! KIS caps a daily-price response at roughly 100 rows, so a long history is
//! assembled from windows walking backward from the end date. The overseas
//! endpoint takes only an end date and always answers with the rows ending
//! there, so consecutive windows overlap; rows outside the requested window
//! are dropped and the rest de-duplicated by date.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use log::{debug, info};

use kisbook::{DailyBar, PriceSeries};

use crate::error::{BrokerError, Result};
use crate::market::Market;
use crate::types::{Record, field_f64, field_str};

/// Calendar days requested per window.
pub const DEFAULT_CHUNK_DAYS: u64 = 100;

/// Where a market's daily-price rows keep each OHLC field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub date: &'static str,
    pub open: &'static str,
    pub high: &'static str,
    pub low: &'static str,
    pub close: &'static str,
}

impl FieldMap {
    pub const DOMESTIC: FieldMap = FieldMap {
        date: "stck_bsop_date",
        open: "stck_oprc",
        high: "stck_hgpr",
        low: "stck_lwpr",
        close: "stck_clpr",
    };

    pub const OVERSEAS: FieldMap = FieldMap {
        date: "xymd",
        open: "open",
        high: "high",
        low: "low",
        close: "clos",
    };

    pub fn for_market(market: Market) -> &'static FieldMap {
        match market {
            Market::Domestic => &Self::DOMESTIC,
            Market::Overseas => &Self::OVERSEAS,
        }
    }

    /// Trading date of a row (`YYYYMMDD`), `None` when missing or malformed.
    pub fn date_of(&self, record: &Record) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(field_str(record, self.date)?, "%Y%m%d").ok()
    }

    /// Build a bar. Prices that do not parse come through as NaN.
    pub fn bar(&self, date: NaiveDate, record: &Record) -> DailyBar {
        DailyBar::new(
            date,
            field_f64(record, self.open),
            field_f64(record, self.high),
            field_f64(record, self.low),
            field_f64(record, self.close),
        )
    }
}

/// Raw rows for one window, as returned by the provider.
#[derive(Debug, Clone, Default)]
pub struct PriceChunk {
    /// Instrument name, when the endpoint reports one.
    pub name: Option<String>,
    /// Rows in provider order (newest first for KIS).
    pub records: Vec<Record>,
}

/// A provider of daily price rows for one market.
pub trait DailyPriceSource {
    fn market(&self) -> Market;

    /// Rows for `symbol` between `first` and `end` inclusive. Providers may
    /// ignore `first` and return extra, older rows.
    fn daily_chunk(&self, symbol: &str, first: NaiveDate, end: NaiveDate) -> Result<PriceChunk>;
}

/// Assembled history, ascending by date.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub name: Option<String>,
    pub bars: Vec<DailyBar>,
}

impl History {
    /// Validate into a series; bad rows surface as [`BrokerError::Data`].
    pub fn into_series(self) -> Result<PriceSeries> {
        Ok(PriceSeries::new(self.bars)?)
    }
}

/// Fetch daily bars for `symbol` from `start` to `end` inclusive.
///
/// Walks backward in windows of at most `chunk_days` calendar days. Every
/// row inside `[start, window_end]` is kept, including rows older than the
/// window a provider returns unasked. The next window ends the day before
/// the oldest row received, so a provider that caps its row count leaves no
/// gap. Stops at the first row dated before `start` or without a usable
/// date, at a window that yields no rows, or once `start` is reached.
pub fn fetch_history(
    source: &impl DailyPriceSource,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    chunk_days: u64,
) -> Result<History> {
    if chunk_days == 0 {
        return Err(BrokerError::Config("chunk size must be at least one day".into()));
    }
    if start > end {
        return Err(BrokerError::Config(format!(
            "start date {start} is after end date {end}"
        )));
    }

    let fields = FieldMap::for_market(source.market());
    let mut bars: BTreeMap<NaiveDate, DailyBar> = BTreeMap::new();
    let mut name = None;
    let mut window_end = end;

    loop {
        let span = (window_end - start).num_days() as u64;
        let first = if span > chunk_days {
            window_end - Days::new(chunk_days)
        } else {
            start
        };
        debug!("{symbol}: requesting {first}..={window_end}");

        let chunk = source.daily_chunk(symbol, first, window_end)?;
        if name.is_none() {
            name = chunk.name;
        }

        let mut oldest: Option<NaiveDate> = None;
        let mut exhausted = false;
        for record in &chunk.records {
            let Some(date) = fields.date_of(record) else {
                exhausted = true;
                break;
            };
            if date < start {
                exhausted = true;
                break;
            }
            if date > window_end {
                continue;
            }
            bars.entry(date).or_insert_with(|| fields.bar(date, record));
            oldest = Some(oldest.map_or(date, |o| o.min(date)));
        }

        let Some(oldest) = oldest else { break };
        if exhausted || oldest <= start {
            break;
        }
        match oldest.checked_sub_days(Days::new(1)) {
            Some(prev) => window_end = prev,
            None => break,
        }
    }

    info!("{symbol}: fetched {} daily bars", bars.len());
    Ok(History {
        name,
        bars: bars.into_values().collect(),
    })
}
