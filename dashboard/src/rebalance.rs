//! Holdings → target allocation diff.
//!
//! For every held position the current weight is compared to its target
//! and the difference is converted to a whole-share buy or sell count at
//! the current price. Nothing is traded; the result is a suggestion.

use kisbook_broker::Holding;
use log::warn;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::target::Targets;

/// Suggested trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    fn from_shares(shares: i64) -> Self {
        match shares {
            s if s > 0 => Action::Buy,
            s if s < 0 => Action::Sell,
            _ => Action::Hold,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// One row of the rebalancing table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceLine {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub quantity: f64,
    pub value: f64,
    /// `None` when the holding has no configured target (treated as 0).
    pub target: Option<f64>,
    pub current_fraction: f64,
    /// `current_fraction - target`.
    pub diff: f64,
    /// Positive to buy, negative to sell.
    pub shares: i64,
    pub action: Action,
}

/// Rebalancing suggestions for `holdings` against `targets`.
///
/// Weights are taken over the total value of all holdings. Holdings without
/// a usable price are skipped.
pub fn compute_rebalance(holdings: &[Holding], targets: &Targets) -> Vec<RebalanceLine> {
    let total_value: f64 = holdings.iter().map(|h| h.value).sum();
    if !total_value.is_finite() || total_value <= 0.0 {
        if !holdings.is_empty() {
            warn!("holdings have no positive total value; nothing to rebalance");
        }
        return Vec::new();
    }

    let mut lines = Vec::with_capacity(holdings.len());
    for h in holdings {
        if !h.current_price.is_finite() || h.current_price <= 0.0 {
            warn!("skipping {} ({}): price {} is not positive", h.symbol, h.name, h.current_price);
            continue;
        }
        let target = targets.fraction(&h.symbol, &h.name);
        if target.is_none() {
            warn!("no target for {} ({}); treating as 0", h.symbol, h.name);
        }
        let current_fraction = h.value / total_value;
        let diff = current_fraction - target.unwrap_or(0.0);
        let shares = (-total_value * diff / h.current_price).round() as i64;

        lines.push(RebalanceLine {
            symbol: h.symbol.clone(),
            name: h.name.clone(),
            price: h.current_price,
            quantity: h.quantity,
            value: h.value,
            target,
            current_fraction,
            diff,
            shares,
            action: Action::from_shares(shares),
        });
    }
    lines
}

/// Target keys that match no holding by symbol or name, sorted.
pub fn unheld_targets<'a>(holdings: &[Holding], targets: &'a Targets) -> Vec<&'a str> {
    let held: FxHashSet<&str> = holdings
        .iter()
        .flat_map(|h| [h.symbol.as_str(), h.name.as_str()])
        .collect();
    targets
        .keys()
        .into_iter()
        .filter(|key| !held.contains(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(symbol: &str, name: &str, price: f64, qty: f64) -> Holding {
        Holding {
            symbol: symbol.into(),
            name: name.into(),
            avg_price: price,
            current_price: price,
            quantity: qty,
            purchase_amount: price * qty,
            value: price * qty,
            pnl: 0.0,
            pnl_rate: 0.0,
        }
    }

    fn targets(entries: &[(&str, f64)]) -> Targets {
        Targets::new(entries.iter().map(|(k, v)| (k.to_string(), *v)))
    }

    #[test]
    fn overweight_sells_underweight_buys() {
        // total 10_000: A 70%, B 30%; targets 50/50
        let h = [holding("A", "Alpha", 100.0, 70.0), holding("B", "Beta", 50.0, 60.0)];
        let lines = compute_rebalance(&h, &targets(&[("A", 0.5), ("B", 0.5)]));

        assert_eq!(lines.len(), 2);
        assert!((lines[0].current_fraction - 0.7).abs() < 1e-12);
        assert!((lines[0].diff - 0.2).abs() < 1e-12);
        assert_eq!(lines[0].shares, -20);
        assert_eq!(lines[0].action, Action::Sell);
        assert_eq!(lines[1].shares, 40);
        assert_eq!(lines[1].action, Action::Buy);
    }

    #[test]
    fn on_target_holds() {
        let h = [holding("A", "Alpha", 10.0, 50.0), holding("B", "Beta", 10.0, 50.0)];
        let lines = compute_rebalance(&h, &targets(&[("A", 0.5), ("B", 0.5)]));
        assert!(lines.iter().all(|l| l.shares == 0 && l.action == Action::Hold));
    }

    #[test]
    fn missing_target_means_sell_all() {
        let h = [holding("A", "Alpha", 10.0, 50.0), holding("B", "Beta", 10.0, 50.0)];
        let lines = compute_rebalance(&h, &targets(&[("A", 1.0)]));
        let b = lines.iter().find(|l| l.symbol == "B").unwrap();
        assert_eq!(b.target, None);
        assert_eq!(b.shares, -50);
    }

    #[test]
    fn matches_by_name() {
        let h = [holding("000660", "SK하이닉스", 100.0, 10.0)];
        let lines = compute_rebalance(&h, &targets(&[("SK하이닉스", 0.5)]));
        assert_eq!(lines[0].target, Some(0.5));
        assert_eq!(lines[0].shares, -5);
    }

    #[test]
    fn rounds_to_nearest_share() {
        // total 1000, diff -0.1 → buy 100 / 30 = 3.33 → 3
        let h = [holding("A", "A", 30.0, 10.0), holding("B", "B", 700.0, 1.0)];
        let lines = compute_rebalance(&h, &targets(&[("A", 0.4), ("B", 0.6)]));
        assert_eq!(lines[0].shares, 3);
        // B: 0.7 - 0.6 = 0.1 → sell 100 / 700 = 0.14 → 0
        assert_eq!(lines[1].shares, 0);
    }

    #[test]
    fn zero_price_skipped() {
        let mut bad = holding("B", "Beta", 10.0, 5.0);
        bad.current_price = 0.0;
        let h = [holding("A", "Alpha", 10.0, 5.0), bad];
        let lines = compute_rebalance(&h, &targets(&[("A", 0.5)]));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].symbol, "A");
    }

    #[test]
    fn empty_account() {
        assert!(compute_rebalance(&[], &targets(&[("A", 1.0)])).is_empty());
    }

    #[test]
    fn unheld() {
        let h = [holding("000660", "SK하이닉스", 100.0, 10.0)];
        let t = targets(&[("SK하이닉스", 0.2), ("TSLA", 0.1), ("000660", 0.1)]);
        assert_eq!(unheld_targets(&h, &t), ["TSLA"]);
    }
}
