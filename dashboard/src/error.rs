//! Error types for the dashboard.

use std::path::PathBuf;

/// All errors that can occur while building a report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Broker(#[from] kisbook_broker::BrokerError),

    #[error(transparent)]
    Data(#[from] kisbook::DataIntegrityError),

    #[error("failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Configuration problems abort the run; everything else is per-symbol
    /// or per-request.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ConfigRead { .. }
                | Error::ConfigParse(_)
                | Error::Broker(kisbook_broker::BrokerError::Config(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
