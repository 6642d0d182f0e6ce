//! Blocking KIS Open API REST client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use serde_json::json;

use crate::auth::{CachedToken, CredentialProvider, Credentials, IssuedToken, TokenCache, TokenIssuer};
use crate::balance::{BalancePage, BalanceSource, Continuation, HoldingFieldMap};
use crate::error::{BrokerError, Result};
use crate::history::{DailyPriceSource, PriceChunk};
use crate::market::{Exchange, Market};
use crate::types::{Envelope, TokenResponse, field_str};

pub const MOCK_BASE_URL: &str = "https://openapivts.koreainvestment.com:29443";
pub const REAL_BASE_URL: &str = "https://openapi.koreainvestment.com:9443";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Token lifetime assumed when the response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 86_400;

const TOKEN_PATH: &str = "/oauth2/tokenP";
const DOMESTIC_DAILY_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice";
const OVERSEAS_DAILY_PATH: &str = "/uapi/overseas-price/v1/quotations/dailyprice";
const DOMESTIC_BALANCE_PATH: &str = "/uapi/domestic-stock/v1/trading/inquire-balance";
const OVERSEAS_BALANCE_PATH: &str = "/uapi/overseas-stock/v1/trading/inquire-balance";
const DAY_NIGHT_PATH: &str = "/uapi/overseas-stock/v1/trading/dayornight";

/// Brokerage account number: 8-digit prefix and 2-digit product code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub prefix: String,
    pub product: String,
}

impl FromStr for Account {
    type Err = BrokerError;

    /// Parses `"12345678-01"`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || BrokerError::Config(format!("account number must look like 12345678-01, got '{s}'"));
        let (prefix, product) = s.trim().split_once('-').ok_or_else(bad)?;
        let digits = |p: &str, n: usize| p.len() == n && p.bytes().all(|b| b.is_ascii_digit());
        if !digits(prefix, 8) || !digits(product, 2) {
            return Err(bad());
        }
        Ok(Account {
            prefix: prefix.to_string(),
            product: product.to_string(),
        })
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.product)
    }
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Use the paper-trading environment.
    pub mock: bool,
    pub timeout: Duration,
    /// Overrides the environment's default base URL.
    pub base_url: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            mock: true,
            timeout: DEFAULT_TIMEOUT,
            base_url: None,
        }
    }
}

impl ClientOptions {
    pub fn base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.mock => MOCK_BASE_URL,
            None => REAL_BASE_URL,
        }
    }
}

/// Transaction id of the domestic balance inquiry.
pub fn domestic_balance_tr_id(mock: bool) -> &'static str {
    if mock { "VTTC8434R" } else { "TTTC8434R" }
}

/// Transaction id of the overseas balance inquiry, which depends on whether
/// the night-session ledger is active.
pub fn overseas_balance_tr_id(mock: bool, night: bool) -> &'static str {
    match (mock, night) {
        (true, false) => "VTTS3012R",
        (true, true) => "VTTT3012R",
        (false, false) => "TTTS3012R",
        (false, true) => "JTTT3012R",
    }
}

fn build_http(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BrokerError::Connection(format!("failed to build HTTP client: {e}")))
}

/// Read a response body, mapping transport errors.
fn read_body(what: &'static str, resp: Response) -> Result<(reqwest::StatusCode, String, String)> {
    let status = resp.status();
    let tr_cont = resp
        .headers()
        .get("tr_cont")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let text = resp.text().map_err(|e| BrokerError::from_transport(what, e))?;
    Ok((status, tr_cont, text))
}

/// Issues tokens through `/oauth2/tokenP`.
pub struct TokenEndpoint {
    http: Client,
    base_url: String,
}

impl TokenEndpoint {
    pub fn new(options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            http: build_http(options.timeout)?,
            base_url: options.base_url().to_string(),
        })
    }
}

impl TokenIssuer for TokenEndpoint {
    fn issue_token(&self, credentials: &Credentials) -> Result<IssuedToken> {
        let url = format!("{}{TOKEN_PATH}", self.base_url);
        let body = json!({
            "grant_type": "client_credentials",
            "appkey": credentials.app_key(),
            "appsecret": credentials.app_secret(),
        });
        let resp = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| BrokerError::from_transport("token request", e))?;
        let (status, _, text) = read_body("token request", resp)?;

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                BrokerError::Parse {
                    what: "token response",
                    detail: e.to_string(),
                }
            } else {
                BrokerError::Auth(format!("token endpoint returned {status}"))
            }
        })?;
        match parsed.access_token {
            Some(token) if !token.is_empty() => Ok(IssuedToken {
                access_token: token,
                expires_in_secs: parsed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            }),
            _ => Err(BrokerError::Auth(format!(
                "{} {}",
                parsed.error_code.unwrap_or_else(|| status.to_string()),
                parsed.error_description.unwrap_or_default()
            ))),
        }
    }
}

/// Authenticated KIS client.
pub struct KisClient {
    http: Client,
    base_url: String,
    mock: bool,
    credentials: Credentials,
    token: CachedToken,
    account: Option<Account>,
}

impl KisClient {
    /// Build the client and obtain an access token, reusing the cached one
    /// when it is still valid.
    pub fn connect(
        options: &ClientOptions,
        credentials: Credentials,
        cache: TokenCache,
        account: Option<Account>,
    ) -> Result<Self> {
        let provider = CredentialProvider::new(TokenEndpoint::new(options)?, credentials, cache);
        let token = provider.access_token(Utc::now())?;
        info!(
            "Connected to KIS {} environment",
            if options.mock { "mock" } else { "real" }
        );
        Ok(Self {
            http: build_http(options.timeout)?,
            base_url: options.base_url().to_string(),
            mock: options.mock,
            credentials: provider.credentials().clone(),
            token,
            account,
        })
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    pub fn token(&self) -> &CachedToken {
        &self.token
    }

    fn account(&self) -> Result<&Account> {
        self.account
            .as_ref()
            .ok_or_else(|| BrokerError::Config("an account number is required for balance queries".into()))
    }

    /// GET a `/uapi` endpoint. Returns the envelope and the `tr_cont` header.
    fn get(
        &self,
        what: &'static str,
        path: &str,
        tr_id: &str,
        query: &[(&str, String)],
        continuing: bool,
    ) -> Result<(Envelope, String)> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {path} tr_id={tr_id}");
        let mut req = self
            .http
            .get(&url)
            .header("content-type", "application/json")
            .header("authorization", self.token.bearer())
            .header("appkey", self.credentials.app_key())
            .header("appsecret", self.credentials.app_secret())
            .header("tr_id", tr_id)
            .query(query);
        if continuing {
            req = req.header("tr_cont", "N");
        }
        let resp = req.send().map_err(|e| BrokerError::from_transport(what, e))?;
        let (status, tr_cont, text) = read_body(what, resp)?;

        if !status.is_success() {
            // KIS reports some refusals as HTTP errors with a normal envelope.
            return match Envelope::parse(what, &text) {
                Err(e @ BrokerError::Exhausted { .. }) => Err(e),
                _ => Err(BrokerError::Connection(format!("{what} returned {status}"))),
            };
        }
        Ok((Envelope::parse(what, &text)?, tr_cont))
    }

    /// Domestic daily bars between `first` and `end` (adjusted prices).
    pub fn domestic_daily_prices(&self, symbol: &str, first: NaiveDate, end: NaiveDate) -> Result<PriceChunk> {
        let query = [
            ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
            ("FID_INPUT_ISCD", symbol.to_string()),
            ("FID_INPUT_DATE_1", first.format("%Y%m%d").to_string()),
            ("FID_INPUT_DATE_2", end.format("%Y%m%d").to_string()),
            ("FID_PERIOD_DIV_CODE", "D".to_string()),
            ("FID_ORG_ADJ_PRC", "0".to_string()),
        ];
        let (env, _) = self.get("domestic prices", DOMESTIC_DAILY_PATH, "FHKST03010100", &query, false)?;
        Ok(PriceChunk {
            name: env
                .object("output1")
                .and_then(|o| field_str(o, "hts_kor_isnm"))
                .map(str::to_string),
            records: env.records("output2"),
        })
    }

    /// Overseas daily bars ending at `end` (adjusted prices). The endpoint
    /// has no start parameter.
    pub fn overseas_daily_prices(&self, exchange: Exchange, symbol: &str, end: NaiveDate) -> Result<PriceChunk> {
        let query = [
            ("AUTH", String::new()),
            ("EXCD", exchange.quote_code().to_string()),
            ("SYMB", symbol.to_string()),
            ("GUBN", "0".to_string()),
            ("BYMD", end.format("%Y%m%d").to_string()),
            ("MODP", "1".to_string()),
        ];
        let (env, _) = self.get("overseas prices", OVERSEAS_DAILY_PATH, "HHDFS76240000", &query, false)?;
        Ok(PriceChunk {
            name: None,
            records: env.records("output2"),
        })
    }

    /// Whether the overseas night-session ledger is active.
    pub fn night_session(&self) -> Result<bool> {
        let (env, _) = self.get("day/night flag", DAY_NIGHT_PATH, "JTTT3010R", &[], false)?;
        let flag = env
            .object("output")
            .and_then(|o| field_str(o, "PSBL_YN"))
            .ok_or_else(|| BrokerError::Parse {
                what: "day/night flag",
                detail: "missing output.PSBL_YN".into(),
            })?;
        Ok(flag != "N")
    }

    pub fn domestic_balance_page(&self, continuation: Option<&Continuation>) -> Result<BalancePage> {
        let account = self.account()?;
        let cont = continuation.cloned().unwrap_or_default();
        let query = [
            ("CANO", account.prefix.clone()),
            ("ACNT_PRDT_CD", account.product.clone()),
            ("AFHR_FLPR_YN", "N".to_string()),
            ("OFL_YN", "N".to_string()),
            ("INQR_DVSN", "01".to_string()),
            ("UNPR_DVSN", "01".to_string()),
            ("FUND_STTL_ICLD_YN", "N".to_string()),
            ("FNCG_AMT_AUTO_RDPT_YN", "N".to_string()),
            ("PRCS_DVSN", "01".to_string()),
            ("CTX_AREA_FK100", cont.fk),
            ("CTX_AREA_NK100", cont.nk),
        ];
        let (env, tr_cont) = self.get(
            "domestic balance",
            DOMESTIC_BALANCE_PATH,
            domestic_balance_tr_id(self.mock),
            &query,
            continuation.is_some(),
        )?;
        Ok(balance_page(&env, &tr_cont, &HoldingFieldMap::DOMESTIC))
    }

    pub fn overseas_balance_page(
        &self,
        exchange: Exchange,
        tr_id: &str,
        continuation: Option<&Continuation>,
    ) -> Result<BalancePage> {
        let account = self.account()?;
        let cont = continuation.cloned().unwrap_or_default();
        let query = [
            ("CANO", account.prefix.clone()),
            ("ACNT_PRDT_CD", account.product.clone()),
            ("OVRS_EXCG_CD", exchange.trading_code().to_string()),
            ("TR_CRCY_CD", exchange.currency().to_string()),
            ("CTX_AREA_FK200", cont.fk),
            ("CTX_AREA_NK200", cont.nk),
        ];
        let (env, tr_cont) = self.get(
            "overseas balance",
            OVERSEAS_BALANCE_PATH,
            tr_id,
            &query,
            continuation.is_some(),
        )?;
        Ok(balance_page(&env, &tr_cont, &HoldingFieldMap::OVERSEAS))
    }

    /// Daily-price source for one exchange.
    pub fn prices(&self, exchange: Exchange) -> DailyPrices<'_> {
        DailyPrices { client: self, exchange }
    }

    /// Balance source for one exchange. Overseas queries look up the
    /// day/night ledger once here.
    pub fn balances(&self, exchange: Exchange) -> Result<Balances<'_>> {
        let tr_id = match exchange.market() {
            Market::Domestic => domestic_balance_tr_id(self.mock),
            Market::Overseas => overseas_balance_tr_id(self.mock, self.night_session()?),
        };
        Ok(Balances {
            client: self,
            exchange,
            tr_id,
        })
    }
}

fn balance_page(env: &Envelope, tr_cont: &str, fields: &HoldingFieldMap) -> BalancePage {
    let (fk, nk) = fields.continuation;
    BalancePage {
        records: env.records("output1"),
        next: Continuation::from_response(tr_cont, env.text(fk), env.text(nk)),
    }
}

/// [`DailyPriceSource`] backed by a live client.
pub struct DailyPrices<'a> {
    client: &'a KisClient,
    exchange: Exchange,
}

impl DailyPriceSource for DailyPrices<'_> {
    fn market(&self) -> Market {
        self.exchange.market()
    }

    fn daily_chunk(&self, symbol: &str, first: NaiveDate, end: NaiveDate) -> Result<PriceChunk> {
        match self.exchange.market() {
            Market::Domestic => self.client.domestic_daily_prices(symbol, first, end),
            Market::Overseas => self.client.overseas_daily_prices(self.exchange, symbol, end),
        }
    }
}

/// [`BalanceSource`] backed by a live client.
pub struct Balances<'a> {
    client: &'a KisClient,
    exchange: Exchange,
    tr_id: &'static str,
}

impl Balances<'_> {
    pub fn tr_id(&self) -> &'static str {
        self.tr_id
    }
}

impl BalanceSource for Balances<'_> {
    fn market(&self) -> Market {
        self.exchange.market()
    }

    fn balance_page(&self, continuation: Option<&Continuation>) -> Result<BalancePage> {
        match self.exchange.market() {
            Market::Domestic => self.client.domestic_balance_page(continuation),
            Market::Overseas => self
                .client
                .overseas_balance_page(self.exchange, self.tr_id, continuation),
        }
    }
}
