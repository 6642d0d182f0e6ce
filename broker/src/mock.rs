//! In-memory KIS stand-in for tests: serves daily prices and balance pages
//! without network calls and records what was requested.
//!
//! ```ignore
//! use kisbook_broker::market::Market;
//! use kisbook_broker::mock::MockKis;
//!
//! let kis = MockKis::builder(Market::Overseas)
//!     .bars(bars)
//!     .rows_per_response(100)
//!     .build();
//! let history = fetch_history(&kis, "AAPL", start, end, 100)?;
//! assert_eq!(kis.requested_windows().len(), 3);
//! ```

use std::sync::Mutex;

use chrono::NaiveDate;
use serde_json::Value;

use kisbook::DailyBar;

use crate::balance::{BalancePage, BalanceSource, Continuation};
use crate::error::{BrokerError, Result};
use crate::history::{DailyPriceSource, FieldMap, PriceChunk};
use crate::market::Market;
use crate::types::Record;

/// Builder for [`MockKis`].
pub struct MockKisBuilder {
    market: Market,
    name: Option<String>,
    bars: Vec<DailyBar>,
    extra_records: Vec<Record>,
    rows_per_response: usize,
    ignore_start: bool,
    fail_on_request: Option<usize>,
    holdings: Vec<Record>,
    page_size: usize,
}

impl MockKisBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Price history to serve, in any order.
    pub fn bars(mut self, bars: Vec<DailyBar>) -> Self {
        self.bars = bars;
        self
    }

    /// Raw row appended to every price response after the bar rows.
    pub fn with_record(mut self, record: Record) -> Self {
        self.extra_records.push(record);
        self
    }

    pub fn rows_per_response(mut self, n: usize) -> Self {
        self.rows_per_response = n;
        self
    }

    /// Answer with rows ending at the window end regardless of its start,
    /// like the overseas daily-price endpoint. Defaults on for overseas.
    pub fn ignore_start(mut self, yes: bool) -> Self {
        self.ignore_start = yes;
        self
    }

    /// Fail the n-th price request (1-based) with a provider error.
    pub fn fail_on_request(mut self, n: usize) -> Self {
        self.fail_on_request = Some(n);
        self
    }

    pub fn holding(mut self, record: Record) -> Self {
        self.holdings.push(record);
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n.max(1);
        self
    }

    pub fn build(mut self) -> MockKis {
        self.bars.sort_by_key(|b| std::cmp::Reverse(b.date));
        MockKis {
            market: self.market,
            name: self.name,
            bars: self.bars,
            extra_records: self.extra_records,
            rows_per_response: self.rows_per_response,
            ignore_start: self.ignore_start,
            fail_on_request: self.fail_on_request,
            holdings: self.holdings,
            page_size: self.page_size,
            windows: Mutex::new(Vec::new()),
            balance_requests: Mutex::new(Vec::new()),
        }
    }
}

/// A fake KIS account for one market.
pub struct MockKis {
    market: Market,
    name: Option<String>,
    /// Newest first, as KIS returns them.
    bars: Vec<DailyBar>,
    extra_records: Vec<Record>,
    rows_per_response: usize,
    ignore_start: bool,
    fail_on_request: Option<usize>,
    holdings: Vec<Record>,
    page_size: usize,
    windows: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    balance_requests: Mutex<Vec<Option<Continuation>>>,
}

impl MockKis {
    pub fn builder(market: Market) -> MockKisBuilder {
        MockKisBuilder {
            market,
            name: None,
            bars: Vec::new(),
            extra_records: Vec::new(),
            rows_per_response: 100,
            ignore_start: market == Market::Overseas,
            fail_on_request: None,
            holdings: Vec::new(),
            page_size: 2,
        }
    }

    /// Every `(first, end)` window requested so far.
    pub fn requested_windows(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.windows.lock().unwrap().clone()
    }

    /// Continuation keys of every balance request so far.
    pub fn balance_requests(&self) -> Vec<Option<Continuation>> {
        self.balance_requests.lock().unwrap().clone()
    }

    fn to_record(&self, bar: &DailyBar) -> Record {
        let fields = FieldMap::for_market(self.market);
        let mut rec = Record::new();
        rec.insert(
            fields.date.into(),
            Value::String(bar.date.format("%Y%m%d").to_string()),
        );
        for (key, v) in [
            (fields.open, bar.open),
            (fields.high, bar.high),
            (fields.low, bar.low),
            (fields.close, bar.close),
        ] {
            rec.insert(key.into(), Value::String(v.to_string()));
        }
        rec
    }
}

impl DailyPriceSource for MockKis {
    fn market(&self) -> Market {
        self.market
    }

    fn daily_chunk(&self, _symbol: &str, first: NaiveDate, end: NaiveDate) -> Result<PriceChunk> {
        let request_no = {
            let mut windows = self.windows.lock().unwrap();
            windows.push((first, end));
            windows.len()
        };
        if self.fail_on_request == Some(request_no) {
            return Err(BrokerError::Exhausted {
                code: "EGW00201".into(),
                message: "mock: too many requests".into(),
            });
        }

        let mut records: Vec<Record> = self
            .bars
            .iter()
            .filter(|b| b.date <= end && (self.ignore_start || b.date >= first))
            .take(self.rows_per_response)
            .map(|b| self.to_record(b))
            .collect();
        records.extend(self.extra_records.iter().cloned());

        Ok(PriceChunk {
            name: self.name.clone(),
            records,
        })
    }
}

impl BalanceSource for MockKis {
    fn market(&self) -> Market {
        self.market
    }

    fn balance_page(&self, continuation: Option<&Continuation>) -> Result<BalancePage> {
        self.balance_requests.lock().unwrap().push(continuation.cloned());

        let page: usize = match continuation {
            None => 0,
            Some(c) => c
                .nk
                .strip_prefix("page")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| BrokerError::Exhausted {
                    code: "OPSQ0002".into(),
                    message: format!("mock: bad continuation key {:?}", c.nk),
                })?,
        };
        let from = (page * self.page_size).min(self.holdings.len());
        let to = (from + self.page_size).min(self.holdings.len());
        let next = (to < self.holdings.len()).then(|| Continuation {
            fk: format!("page{}", page + 1),
            nk: format!("page{}", page + 1),
        });
        Ok(BalancePage {
            records: self.holdings[from..to].to_vec(),
            next,
        })
    }
}
