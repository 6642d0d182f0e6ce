//! KIS wire types shared by the client, history and balance modules.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{BrokerError, Result};

/// One row of a KIS response array, keyed by the provider's field names.
pub type Record = Map<String, Value>;

/// Body of `/oauth2/tokenP`.
///
/// Successful responses carry `access_token`/`expires_in`; refusals carry
/// `error_code`/`error_description` instead.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Common envelope of every `/uapi` response.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// `"0"` on success.
    #[serde(default)]
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Envelope {
    /// Parse a response body and reject provider error payloads.
    pub fn parse(what: &'static str, text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text).map_err(|e| BrokerError::Parse {
            what,
            detail: e.to_string(),
        })?;
        if envelope.rt_cd != "0" {
            return Err(BrokerError::Exhausted {
                code: if envelope.msg_cd.is_empty() {
                    envelope.rt_cd
                } else {
                    envelope.msg_cd
                },
                message: envelope.msg1.trim().to_string(),
            });
        }
        Ok(envelope)
    }

    /// The array under `key`, or empty when absent.
    pub fn records(&self, key: &str) -> Vec<Record> {
        match self.body.get(key) {
            Some(Value::Array(rows)) => rows
                .iter()
                .filter_map(|row| row.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The object under `key`. Some endpoints send a one-element array instead.
    pub fn object(&self, key: &str) -> Option<&Record> {
        match self.body.get(key)? {
            Value::Object(map) => Some(map),
            Value::Array(rows) => rows.first()?.as_object(),
            _ => None,
        }
    }

    /// A string field at the top level of the body, trimmed.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.body.get(key)?.as_str().map(str::trim)
    }
}

/// Text value of `field`, trimmed; `None` when missing, null or blank.
pub fn field_str<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    let s = record.get(field)?.as_str()?.trim();
    (!s.is_empty()).then_some(s)
}

/// Numeric value of `field`. KIS sends numbers as strings; anything that does
/// not parse becomes NaN so downstream validation can reject it.
pub fn field_f64(record: &Record, field: &str) -> f64 {
    match record.get(field) {
        Some(Value::String(s)) => s.trim().replace(',', "").parse().unwrap_or(f64::NAN),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
