//! Access-token issuance and the file-backed token cache.
//!
//! KIS tokens live for about a day and issuance is rate limited, so a token is
//! cached on disk and reused until it expires. The cache records a SHA-256
//! fingerprint of the app key and secret instead of the secret itself; a
//! token issued for other credentials is never reused.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{BrokerError, Result};

/// Tokens this close to expiry are treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// App key and secret issued by KIS Developers.
#[derive(Clone)]
pub struct Credentials {
    app_key: String,
    app_secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(app_key: &str, app_secret: &str) -> Result<Self> {
        if app_key.trim().is_empty() {
            return Err(BrokerError::Config("app key must not be empty".into()));
        }
        if app_secret.trim().is_empty() {
            return Err(BrokerError::Config("app secret must not be empty".into()));
        }
        Ok(Self {
            app_key: app_key.trim().to_string(),
            app_secret: Zeroizing::new(app_secret.trim().to_string()),
        })
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }

    /// Hex SHA-256 of `key:secret`, stored alongside cached tokens.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.app_key.as_bytes());
        hasher.update(b":");
        hasher.update(self.app_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

/// A freshly issued token as returned by the OAuth endpoint.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in_secs: i64,
}

/// A token persisted in the cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub fingerprint: String,
}

impl CachedToken {
    pub fn from_issued(issued: IssuedToken, credentials: &Credentials, now: DateTime<Utc>) -> Self {
        Self {
            access_token: issued.access_token,
            expires_at: now + Duration::seconds(issued.expires_in_secs),
            fingerprint: credentials.fingerprint(),
        }
    }

    /// Usable at `now` by these credentials.
    pub fn is_valid(&self, now: DateTime<Utc>, credentials: &Credentials) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
            && self.fingerprint == credentials.fingerprint()
    }

    /// Value for the `authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// JSON file holding at most one cached token.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token. A missing file is `None`; so is an unreadable
    /// one, which gets overwritten on the next issue.
    pub fn load(&self) -> Result<Option<CachedToken>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Ignoring corrupt token cache {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    pub fn store(&self, token: &CachedToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(token).map_err(|e| BrokerError::Parse {
            what: "token cache",
            detail: e.to_string(),
        })?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Something that can exchange credentials for a new access token.
pub trait TokenIssuer {
    fn issue_token(&self, credentials: &Credentials) -> Result<IssuedToken>;
}

/// Hands out a valid access token, reusing the cached one when possible.
pub struct CredentialProvider<I> {
    issuer: I,
    credentials: Credentials,
    cache: TokenCache,
}

impl<I: TokenIssuer> CredentialProvider<I> {
    pub fn new(issuer: I, credentials: Credentials, cache: TokenCache) -> Self {
        Self {
            issuer,
            credentials,
            cache,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Issue a new token and persist it.
    pub fn issue(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        let issued = self.issuer.issue_token(&self.credentials)?;
        let token = CachedToken::from_issued(issued, &self.credentials, now);
        self.cache.store(&token)?;
        info!("Issued new access token (expires {})", token.expires_at);
        Ok(token)
    }

    /// The cached token, valid or not.
    pub fn load(&self) -> Result<Option<CachedToken>> {
        self.cache.load()
    }

    /// Whether the cache holds a token usable at `now` by these credentials.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        matches!(self.load(), Ok(Some(t)) if t.is_valid(now, &self.credentials))
    }

    /// A token usable at `now`: the cached one if still valid, else a new one.
    pub fn access_token(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        if let Some(token) = self.load()? {
            if token.is_valid(now, &self.credentials) {
                debug!("Reusing cached access token (expires {})", token.expires_at);
                return Ok(token);
            }
            debug!("Cached access token expired or issued for other credentials");
        }
        self.issue(now)
    }
}
