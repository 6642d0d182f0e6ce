//! Korea Investment & Securities (KIS) Open API client for kisbook.
//!
//! - [`history`]: daily price history, paginated backward in windows and
//!   normalized into [`kisbook::DailyBar`]s
//! - [`balance`]: account holdings across continuation pages, plus totals
//! - [`auth`]: access-token issuance with a file-backed cache
//! - [`client`]: the blocking REST client behind all of the above
//!
//! Retrieval goes through the [`DailyPriceSource`] and [`BalanceSource`]
//! traits, so the paging logic runs unchanged against [`mock::MockKis`].

pub mod auth;
pub mod balance;
pub mod client;
pub mod error;
pub mod history;
pub mod market;
pub mod mock;
pub mod types;

pub use auth::{CachedToken, CredentialProvider, Credentials, TokenCache, TokenIssuer};
pub use balance::{BalanceSource, Holding, PortfolioSummary, fetch_holdings};
pub use client::{Account, ClientOptions, KisClient};
pub use error::{BrokerError, Result};
pub use history::{DEFAULT_CHUNK_DAYS, DailyPriceSource, History, fetch_history};
pub use market::{Exchange, Market};
