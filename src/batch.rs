//! Multi-symbol backtests.
//!
//! Symbols share no state, so with the `parallel` feature each one runs on the
//! rayon pool; without it they run in order.

use crate::error::Result;
use crate::signals::generate_signals;
use crate::simulate::{Backtest, FEE, simulate_with_fee};
use crate::types::PriceSeries;

/// Backtest every `(symbol, series)` pair, keeping input order.
///
/// A failure for one symbol is returned in its slot and does not affect the
/// others.
///
/// ```ignore
/// use kisbook::batch::backtest_many;
///
/// let results = backtest_many(&[("TSLA".to_string(), tsla), ("NVDA".to_string(), nvda)]);
/// for (symbol, result) in results {
///     match result {
///         Ok(bt) => println!("{symbol}: {:.2}", bt.final_hpr()),
///         Err(e) => println!("{symbol}: {e}"),
///     }
/// }
/// ```
pub fn backtest_many(inputs: &[(String, PriceSeries)]) -> Vec<(String, Result<Backtest>)> {
    backtest_many_with_fee(inputs, FEE)
}

/// [`backtest_many`] with an explicit per-trade fee.
pub fn backtest_many_with_fee(
    inputs: &[(String, PriceSeries)],
    fee: f64,
) -> Vec<(String, Result<Backtest>)> {
    let run = |(symbol, series): &(String, PriceSeries)| {
        (symbol.clone(), simulate_with_fee(generate_signals(series), fee))
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        inputs.par_iter().map(run).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        inputs.iter().map(run).collect()
    }
}
