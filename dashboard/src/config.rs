//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use kisbook_broker::{Account, ClientOptions, Credentials, Exchange};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::target::TargetAllocation;

/// Environment variables consulted when the config omits credentials.
pub const APP_KEY_VAR: &str = "KIS_APP_KEY";
pub const APP_SECRET_VAR: &str = "KIS_APP_SECRET";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub kis: KisConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub targets: TargetAllocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KisConfig {
    #[serde(default)]
    pub app_key: Option<String>,
    #[serde(default)]
    pub app_secret: Option<String>,
    /// `12345678-01`; only balance queries need it.
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default = "default_true")]
    pub mock: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Exchange whose overseas balance is shown.
    #[serde(default = "default_exchange")]
    pub overseas_exchange: Exchange,
}

fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    10
}
fn default_token_cache() -> PathBuf {
    PathBuf::from(".kisbook/token.json")
}
fn default_exchange() -> Exchange {
    Exchange::Us
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    #[serde(default = "default_start")]
    pub start: NaiveDate,
    /// Defaults to today.
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default = "default_fee")]
    pub fee: f64,
    #[serde(default = "default_chunk_days")]
    pub chunk_days: u64,
    #[serde(default)]
    pub domestic: Vec<String>,
    #[serde(default)]
    pub overseas: Vec<String>,
    /// Exchange queried for overseas price history.
    #[serde(default = "default_exchange")]
    pub overseas_exchange: Exchange,
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default()
}
fn default_fee() -> f64 {
    kisbook::FEE
}
fn default_chunk_days() -> u64 {
    kisbook_broker::DEFAULT_CHUNK_DAYS
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: None,
            fee: default_fee(),
            chunk_days: default_chunk_days(),
            domestic: Vec::new(),
            overseas: Vec::new(),
            overseas_exchange: default_exchange(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.kis.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        if let Some(account) = &self.kis.account {
            account.parse::<Account>()?;
        }
        let bt = &self.backtest;
        if let Some(end) = bt.end {
            if end < bt.start {
                return Err(Error::Config(format!(
                    "backtest end {end} is before start {}",
                    bt.start
                )));
            }
        }
        if !(0.0..0.1).contains(&bt.fee) {
            return Err(Error::Config("fee must be in [0.0, 0.1)".into()));
        }
        if bt.chunk_days == 0 {
            return Err(Error::Config("chunk_days must be > 0".into()));
        }
        if bt.domestic.iter().chain(&bt.overseas).any(|s| s.trim().is_empty()) {
            return Err(Error::Config("backtest symbols must not be empty".into()));
        }
        if bt.overseas_exchange.market() != kisbook_broker::Market::Overseas {
            return Err(Error::Config(format!(
                "overseas_exchange must be a foreign exchange, got {}",
                bt.overseas_exchange
            )));
        }
        if self.kis.overseas_exchange.market() != kisbook_broker::Market::Overseas {
            return Err(Error::Config(format!(
                "overseas_exchange must be a foreign exchange, got {}",
                self.kis.overseas_exchange
            )));
        }
        self.targets.validate()
    }

    /// Credentials from the config, falling back to `KIS_APP_KEY` and
    /// `KIS_APP_SECRET`.
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials_with(|var| std::env::var(var).ok())
    }

    /// [`Config::credentials`] with an explicit environment lookup.
    pub fn credentials_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
        let key = self
            .kis
            .app_key
            .clone()
            .or_else(|| env(APP_KEY_VAR))
            .ok_or_else(|| Error::Config(format!("no app key: set kis.app_key or {APP_KEY_VAR}")))?;
        let secret = self
            .kis
            .app_secret
            .clone()
            .or_else(|| env(APP_SECRET_VAR))
            .ok_or_else(|| {
                Error::Config(format!("no app secret: set kis.app_secret or {APP_SECRET_VAR}"))
            })?;
        Ok(Credentials::new(&key, &secret)?)
    }

    pub fn account(&self) -> Result<Option<Account>> {
        Ok(self.kis.account.as_deref().map(str::parse::<Account>).transpose()?)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            mock: self.kis.mock,
            timeout: Duration::from_secs(self.kis.timeout_secs),
            base_url: self.kis.base_url.clone(),
        }
    }

    /// Backtest end date, or `today` when unset.
    pub fn backtest_end(&self, today: NaiveDate) -> NaiveDate {
        self.backtest.end.unwrap_or(today)
    }
}
