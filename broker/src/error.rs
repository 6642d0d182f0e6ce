//! Broker error types.

/// Errors that can occur while talking to the brokerage.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Transport-level failure (DNS, TLS, refused connection, bad status).
    #[error("connection error: {0}")]
    Connection(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The provider answered with an error payload, so pagination cannot
    /// continue.
    #[error("provider error {code}: {message}")]
    Exhausted { code: String, message: String },

    /// Token issuance was refused or returned no token.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Missing or invalid credentials or account identifiers.
    #[error("configuration error: {0}")]
    Config(String),

    /// A response body could not be decoded.
    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("token cache error: {0}")]
    Cache(#[from] std::io::Error),

    /// The price bars assembled from a response are inconsistent.
    #[error(transparent)]
    Data(#[from] kisbook::DataIntegrityError),
}

impl BrokerError {
    /// Classify a reqwest error into timeout vs. other transport failure.
    pub(crate) fn from_transport(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrokerError::Timeout(format!("{context}: {err}"))
        } else {
            BrokerError::Connection(format!("{context}: {err}"))
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
