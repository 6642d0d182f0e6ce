//! Target allocations from the `[targets.*]` config tables.

use kisbook_broker::Market;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Slack allowed on the sum of fractions.
pub const TOTAL_TOLERANCE: f64 = 1e-9;

/// Target fractions for one market, keyed by symbol or by display name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Targets(FxHashMap<String, f64>);

impl Targets {
    pub fn new(entries: impl IntoIterator<Item = (String, f64)>) -> Self {
        Targets(entries.into_iter().collect())
    }

    /// Fraction for a holding, looked up by symbol first, then by name.
    pub fn fraction(&self, symbol: &str, name: &str) -> Option<f64> {
        self.0
            .get(symbol)
            .or_else(|| self.0.get(name))
            .copied()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn validate(&self, market: &str) -> Result<()> {
        for (key, &fraction) in &self.0 {
            if key.trim().is_empty() {
                return Err(Error::Config(format!("{market} target with empty key")));
            }
            if !(0.0..=1.0).contains(&fraction) {
                return Err(Error::Config(format!(
                    "{market} target for {key} ({fraction}) must be in [0, 1]"
                )));
            }
        }
        let total = self.total();
        if total > 1.0 + TOTAL_TOLERANCE {
            return Err(Error::Config(format!(
                "{market} targets sum to {total:.4} (> 1.0)"
            )));
        }
        Ok(())
    }
}

/// Domestic and overseas target allocations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TargetAllocation {
    #[serde(default)]
    pub domestic: Targets,
    #[serde(default)]
    pub overseas: Targets,
}

impl TargetAllocation {
    pub fn for_market(&self, market: Market) -> &Targets {
        match market {
            Market::Domestic => &self.domestic,
            Market::Overseas => &self.overseas,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.domestic.validate("domestic")?;
        self.overseas.validate("overseas")
    }
}
