//! Per-symbol recovery in the backtest batch, and the account reports,
//! against the in-memory KIS stand-in.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use kisbook::DailyBar;
use kisbook_broker::history::PriceChunk;
use kisbook_broker::mock::MockKis;
use kisbook_broker::types::Record;
use kisbook_broker::{BrokerError, DailyPriceSource, Market};
use kisbook_dashboard::commands::{backtest_report, balance_report, rebalance_report};
use kisbook_dashboard::error::Error;
use kisbook_dashboard::report::{BacktestRequest, export_json};
use kisbook_dashboard::target::Targets;
use serde_json::json;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn trading_days(from: NaiveDate, to: NaiveDate, base: f64) -> Vec<DailyBar> {
    from.iter_days()
        .take_while(|date| *date <= to)
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .enumerate()
        .map(|(i, date)| {
            let p = base + (i % 11) as f64;
            DailyBar::new(date, p, p + 2.0, p - 1.0, p + 1.0)
        })
        .collect()
}

/// Routes each symbol to its own mock; unknown symbols fail like KIS does.
struct Desk {
    market: Market,
    books: HashMap<String, MockKis>,
}

impl DailyPriceSource for Desk {
    fn market(&self) -> Market {
        self.market
    }

    fn daily_chunk(
        &self,
        symbol: &str,
        first: NaiveDate,
        end: NaiveDate,
    ) -> kisbook_broker::Result<PriceChunk> {
        match self.books.get(symbol) {
            Some(kis) => kis.daily_chunk(symbol, first, end),
            None => Err(BrokerError::Exhausted {
                code: "EGW00001".into(),
                message: "unknown symbol".into(),
            }),
        }
    }
}

fn request() -> BacktestRequest {
    BacktestRequest {
        start: d(2023, 1, 2),
        end: d(2023, 6, 30),
        chunk_days: 100,
        fee: kisbook::FEE,
    }
}

fn desk() -> Desk {
    let mut books = HashMap::new();
    books.insert(
        "000660".to_string(),
        MockKis::builder(Market::Domestic)
            .name("SK하이닉스")
            .bars(trading_days(d(2023, 1, 2), d(2023, 6, 30), 100.0))
            .build(),
    );
    let mut inverted = trading_days(d(2023, 1, 2), d(2023, 6, 30), 50.0);
    inverted[10].high = inverted[10].low - 1.0;
    books.insert(
        "247540".to_string(),
        MockKis::builder(Market::Domestic).bars(inverted).build(),
    );
    books.insert(
        "005930".to_string(),
        MockKis::builder(Market::Domestic)
            .name("삼성전자")
            .bars(trading_days(d(2023, 1, 2), d(2023, 6, 30), 70.0))
            .fail_on_request(1)
            .build(),
    );
    books.insert(
        "035420".to_string(),
        MockKis::builder(Market::Domestic)
            .bars(trading_days(d(2023, 1, 2), d(2023, 6, 30), 200.0))
            .build(),
    );
    Desk {
        market: Market::Domestic,
        books,
    }
}

#[test]
fn bad_symbols_do_not_stop_the_batch() {
    let symbols: Vec<String> = ["000660", "247540", "005930", "NOPE", "035420"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (text, reports) = backtest_report(&desk(), &symbols, &request()).unwrap();

    assert_eq!(reports.len(), 5);
    let order: Vec<_> = reports.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(order, ["000660", "247540", "005930", "NOPE", "035420"]);

    assert!(reports[0].result.is_ok());
    assert!(matches!(
        reports[1].result,
        Err(Error::Broker(BrokerError::Data(_)))
    ));
    assert!(matches!(
        reports[2].result,
        Err(Error::Broker(BrokerError::Exhausted { .. }))
    ));
    assert!(reports[3].result.is_err());
    assert!(reports[4].result.is_ok());

    assert!(text.contains("SK하이닉스 (000660)"));
    assert!(text.contains("247540: data unavailable"));
    assert!(text.contains("NOPE: data unavailable"));
    assert!(text.contains("Max drawdown"));

    let bt = reports[0].result.as_ref().unwrap();
    assert_eq!(bt.rows.first().unwrap().date(), d(2023, 1, 2));
    assert_eq!(bt.rows.last().unwrap().date(), d(2023, 6, 30));
}

#[test]
fn config_errors_abort_the_batch() {
    let mut req = request();
    req.start = d(2024, 1, 1);
    let err = backtest_report(&desk(), &["000660".to_string()], &req).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn batch_exports_json() {
    let symbols = vec!["000660".to_string(), "NOPE".to_string()];
    let (_, reports) = backtest_report(&desk(), &symbols, &request()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backtest.json");
    export_json(&path, &reports).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["backtests"][0]["name"], "SK하이닉스");
    let rows = value["backtests"][0]["rows"].as_array().unwrap();
    assert!(rows.len() > 100);
    assert!(rows[0].get("hpr").is_some());
    assert_eq!(value["unavailable"][0]["symbol"], "NOPE");
}

fn holding(symbol: &str, name: &str, qty: u32, price: f64) -> Record {
    let value = price * qty as f64;
    json!({
        "pdno": symbol,
        "prdt_name": name,
        "pchs_avg_pric": price.to_string(),
        "prpr": price.to_string(),
        "hldg_qty": qty.to_string(),
        "pchs_amt": value.to_string(),
        "evlu_amt": value.to_string(),
        "evlu_pfls_amt": "0",
        "evlu_pfls_rt": "0.00",
    })
    .as_object()
    .unwrap()
    .clone()
}

fn account() -> MockKis {
    MockKis::builder(Market::Domestic)
        .holding(holding("000660", "SK하이닉스", 70, 100.0))
        .holding(holding("005490", "POSCO홀딩스", 60, 50.0))
        .holding(holding("005930", "삼성전자", 0, 70.0))
        .build()
}

#[test]
fn balance_report_lists_holdings_and_totals() {
    let text = balance_report(&account(), "KRW").unwrap();
    assert!(text.contains("SK하이닉스"));
    assert!(text.contains("POSCO홀딩스"));
    assert!(!text.contains("삼성전자"));
    assert!(text.contains("10,000 KRW"));
}

#[test]
fn rebalance_report_suggests_trades() {
    let targets = Targets::new([
        ("SK하이닉스".to_string(), 0.5),
        ("005490".to_string(), 0.4),
        ("TSLA".to_string(), 0.1),
    ]);
    let text = rebalance_report(&account(), &targets, "KRW").unwrap();
    assert!(text.contains("SELL"));
    assert!(text.contains("BUY"));
    assert!(text.contains("Targets not held: TSLA"));
}
