//! Account balance retrieval and portfolio totals.

use log::{debug, warn};
use serde::Serialize;

use crate::error::{BrokerError, Result};
use crate::market::Market;
use crate::types::{Record, field_f64, field_str};

/// Upper bound on continuation requests for one balance query.
pub const MAX_BALANCE_PAGES: usize = 50;

/// A position as reported by the balance endpoints, in the account's
/// trading currency for that market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub avg_price: f64,
    pub current_price: f64,
    pub quantity: f64,
    pub purchase_amount: f64,
    pub value: f64,
    pub pnl: f64,
    /// Percent, as reported by the provider.
    pub pnl_rate: f64,
}

/// Where a market's balance rows keep each holding field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldingFieldMap {
    pub symbol: &'static str,
    pub name: &'static str,
    pub avg_price: &'static str,
    pub current_price: &'static str,
    pub quantity: &'static str,
    pub purchase_amount: &'static str,
    pub value: &'static str,
    pub pnl: &'static str,
    pub pnl_rate: &'static str,
    /// Continuation key field names: (search condition, key).
    pub continuation: (&'static str, &'static str),
}

impl HoldingFieldMap {
    pub const DOMESTIC: HoldingFieldMap = HoldingFieldMap {
        symbol: "pdno",
        name: "prdt_name",
        avg_price: "pchs_avg_pric",
        current_price: "prpr",
        quantity: "hldg_qty",
        purchase_amount: "pchs_amt",
        value: "evlu_amt",
        pnl: "evlu_pfls_amt",
        pnl_rate: "evlu_pfls_rt",
        continuation: ("ctx_area_fk100", "ctx_area_nk100"),
    };

    pub const OVERSEAS: HoldingFieldMap = HoldingFieldMap {
        symbol: "ovrs_pdno",
        name: "ovrs_item_name",
        avg_price: "pchs_avg_pric",
        current_price: "now_pric2",
        quantity: "ovrs_cblc_qty",
        purchase_amount: "frcr_pchs_amt1",
        value: "ovrs_stck_evlu_amt",
        pnl: "frcr_evlu_pfls_amt",
        pnl_rate: "evlu_pfls_rt",
        continuation: ("ctx_area_fk200", "ctx_area_nk200"),
    };

    pub fn for_market(market: Market) -> &'static HoldingFieldMap {
        match market {
            Market::Domestic => &Self::DOMESTIC,
            Market::Overseas => &Self::OVERSEAS,
        }
    }

    /// Normalize one row. Rows without a symbol are padding and yield `None`.
    pub fn holding(&self, record: &Record) -> Result<Option<Holding>> {
        let Some(symbol) = field_str(record, self.symbol) else {
            return Ok(None);
        };
        let number = |field: &'static str| {
            let v = field_f64(record, field);
            if v.is_finite() {
                Ok(v)
            } else {
                Err(BrokerError::Parse {
                    what: "holding",
                    detail: format!("{symbol}: field {field} is not a number"),
                })
            }
        };
        Ok(Some(Holding {
            symbol: symbol.to_string(),
            name: field_str(record, self.name).unwrap_or(symbol).to_string(),
            avg_price: number(self.avg_price)?,
            current_price: number(self.current_price)?,
            quantity: number(self.quantity)?,
            purchase_amount: number(self.purchase_amount)?,
            value: number(self.value)?,
            pnl: number(self.pnl)?,
            pnl_rate: number(self.pnl_rate)?,
        }))
    }
}

/// Keys that fetch the next page of a balance query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Continuation {
    pub fk: String,
    pub nk: String,
}

impl Continuation {
    /// `Some` when the `tr_cont` header says more data follows (`M` or `F`).
    pub fn from_response(tr_cont: &str, fk: Option<&str>, nk: Option<&str>) -> Option<Self> {
        match tr_cont.trim() {
            "M" | "F" => Some(Continuation {
                fk: fk.unwrap_or_default().to_string(),
                nk: nk.unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }
}

/// One page of balance rows.
#[derive(Debug, Clone, Default)]
pub struct BalancePage {
    pub records: Vec<Record>,
    pub next: Option<Continuation>,
}

/// A provider of paged balance rows for one market.
pub trait BalanceSource {
    fn market(&self) -> Market;

    fn balance_page(&self, continuation: Option<&Continuation>) -> Result<BalancePage>;
}

/// All holdings across every page. Zero-quantity rows are dropped.
pub fn fetch_holdings(source: &impl BalanceSource) -> Result<Vec<Holding>> {
    let fields = HoldingFieldMap::for_market(source.market());
    let mut holdings = Vec::new();
    let mut continuation: Option<Continuation> = None;

    for page_no in 1..=MAX_BALANCE_PAGES {
        let page = source.balance_page(continuation.as_ref())?;
        debug!("balance page {page_no}: {} rows", page.records.len());

        for record in &page.records {
            match fields.holding(record)? {
                Some(h) if h.quantity > 0.0 => holdings.push(h),
                Some(h) => debug!("skipping {} with zero quantity", h.symbol),
                None => {}
            }
        }

        match page.next {
            Some(next) if continuation.as_ref() == Some(&next) => {
                warn!("balance continuation key repeated, stopping");
                return Ok(holdings);
            }
            Some(next) => continuation = Some(next),
            None => return Ok(holdings),
        }
    }

    warn!("balance query stopped after {MAX_BALANCE_PAGES} pages");
    Ok(holdings)
}

/// Account totals across holdings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PortfolioSummary {
    pub total_purchase: f64,
    pub total_value: f64,
    pub pnl: f64,
    /// Percent of the purchase amount; zero for an empty account.
    pub pnl_rate: f64,
}

impl PortfolioSummary {
    pub fn from_holdings(holdings: &[Holding]) -> Self {
        let total_purchase: f64 = holdings.iter().map(|h| h.purchase_amount).sum();
        let total_value: f64 = holdings.iter().map(|h| h.value).sum();
        let pnl = total_value - total_purchase;
        let pnl_rate = if total_purchase > 0.0 {
            pnl / total_purchase * 100.0
        } else {
            0.0
        };
        Self {
            total_purchase,
            total_value,
            pnl,
            pnl_rate,
        }
    }
}
