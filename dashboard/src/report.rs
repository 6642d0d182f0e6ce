//! Text rendering and the per-symbol backtest batch.
//!
//! Everything here produces `String`s; printing is left to the binary.
//! [`run_backtests`] is the recovery boundary: a symbol whose history cannot
//! be fetched or validated is reported as unavailable and the rest of the
//! batch still runs.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use kisbook::simulate::TRADING_DAYS;
use kisbook::{Backtest, BacktestRow, DataIntegrityError, PriceSeries};
use kisbook_broker::{DailyPriceSource, Holding, PortfolioSummary, fetch_history};
use log::{info, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::rebalance::RebalanceLine;

const TICKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Default sparkline width in characters.
pub const SPARKLINE_WIDTH: usize = 60;

/// Block-character sparkline of `values`, downsampled to at most `width`
/// characters by averaging.
///
/// Empty input gives an empty string; a flat series is drawn at the lowest
/// level.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }
    let buckets = width.min(values.len());
    let sampled: Vec<f64> = (0..buckets)
        .map(|i| {
            let lo = i * values.len() / buckets;
            let hi = ((i + 1) * values.len() / buckets).max(lo + 1);
            let slice = &values[lo..hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect();

    let min = sampled.iter().copied().fold(f64::INFINITY, f64::min);
    let max = sampled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let top = (TICKS.len() - 1) as f64;

    sampled
        .iter()
        .map(|v| {
            if !span.is_finite() || span <= 0.0 || !v.is_finite() {
                TICKS[0]
            } else {
                let level = ((v - min) / span * top).round() as usize;
                TICKS[level.min(TICKS.len() - 1)]
            }
        })
        .collect()
}

/// Fractional digits shown for amounts in `currency`.
fn decimals(currency: &str) -> usize {
    match currency {
        "KRW" | "JPY" | "VND" => 0,
        _ => 2,
    }
}

/// `1234567.891` → `"1,234,567.89"` with `decimals` fractional digits.
pub fn format_amount(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int, frac) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(fixed.len() + int.len() / 3 + 1);
    // rounding can turn -0.004 into "0.00"
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.push('-');
    }
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

fn money(value: f64, currency: &str) -> String {
    format_amount(value, decimals(currency))
}

/// Holdings table.
pub fn render_holdings(holdings: &[Holding], currency: &str) -> String {
    let mut out = String::new();
    if holdings.is_empty() {
        out.push_str("  (no holdings)\n");
        return out;
    }
    let _ = writeln!(
        out,
        "  {:<10} {:<20} {:>14} {:>14} {:>10} {:>16} {:>16} {:>8}",
        "Symbol", "Name", "Avg price", "Price", "Qty", "Value", "P&L", "P&L %"
    );
    for h in holdings {
        let _ = writeln!(
            out,
            "  {:<10} {:<20} {:>14} {:>14} {:>10} {:>16} {:>16} {:>+7.2}%",
            h.symbol,
            h.name,
            money(h.avg_price, currency),
            money(h.current_price, currency),
            format_amount(h.quantity, 0),
            money(h.value, currency),
            money(h.pnl, currency),
            h.pnl_rate,
        );
    }
    out
}

/// Account totals.
pub fn render_summary(summary: &PortfolioSummary, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Purchase amount: {:>18} {currency}", money(summary.total_purchase, currency));
    let _ = writeln!(out, "  Valuation:       {:>18} {currency}", money(summary.total_value, currency));
    let _ = writeln!(
        out,
        "  P&L:             {:>18} {currency} ({:+.2}%)",
        money(summary.pnl, currency),
        summary.pnl_rate
    );
    out
}

/// Rebalancing table, followed by targets nothing is held for.
pub fn render_rebalance(lines: &[RebalanceLine], unheld: &[&str], currency: &str) -> String {
    let mut out = String::new();
    if lines.is_empty() {
        out.push_str("  (nothing to rebalance)\n");
    } else {
        let _ = writeln!(
            out,
            "  {:<10} {:<20} {:>14} {:>9} {:>9} {:>9} {:<5} {:>8}",
            "Symbol", "Name", "Price", "Current", "Target", "Diff", "", "Shares"
        );
        for line in lines {
            let target = match line.target {
                Some(t) => format!("{:.2}%", t * 100.0),
                None => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "  {:<10} {:<20} {:>14} {:>8.2}% {:>9} {:>+8.2}% {:<5} {:>8}",
                line.symbol,
                line.name,
                money(line.price, currency),
                line.current_fraction * 100.0,
                target,
                line.diff * 100.0,
                line.action,
                line.shares.unsigned_abs(),
            );
        }
    }
    if !unheld.is_empty() {
        let _ = writeln!(out, "\n  Targets not held: {}", unheld.join(", "));
    }
    out
}

/// Backtest window and cost settings.
#[derive(Debug, Clone, Copy)]
pub struct BacktestRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub chunk_days: u64,
    pub fee: f64,
}

/// Outcome of one symbol in a batch.
#[derive(Debug)]
pub struct SymbolReport {
    pub symbol: String,
    /// Instrument name when the provider reports one.
    pub name: Option<String>,
    pub result: Result<Backtest>,
}

impl SymbolReport {
    /// `"name (symbol)"`, or just the symbol.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.symbol),
            None => self.symbol.clone(),
        }
    }
}

fn load_series(
    source: &impl DailyPriceSource,
    symbol: &str,
    request: &BacktestRequest,
) -> Result<(Option<String>, PriceSeries)> {
    let history = fetch_history(source, symbol, request.start, request.end, request.chunk_days)?;
    let name = history.name.clone();
    Ok((name, history.into_series()?))
}

/// Fetch and backtest every symbol, in order.
///
/// Configuration errors (a bad date range or chunk size) abort the batch;
/// retrieval and data errors are kept on the symbol's report.
pub fn run_backtests(
    source: &impl DailyPriceSource,
    symbols: &[String],
    request: &BacktestRequest,
) -> Result<Vec<SymbolReport>> {
    let mut inputs: Vec<(String, PriceSeries)> = Vec::new();
    let mut pending: Vec<(String, Option<String>, Option<Error>)> = Vec::new();

    for symbol in symbols {
        match load_series(source, symbol, request) {
            Ok((name, series)) => {
                info!("{symbol}: {} bars", series.len());
                inputs.push((symbol.clone(), series));
                pending.push((symbol.clone(), name, None));
            }
            Err(e) if e.is_config() => return Err(e),
            Err(e) => {
                warn!("{symbol}: data unavailable: {e}");
                pending.push((symbol.clone(), None, Some(e)));
            }
        }
    }

    let mut results = kisbook::batch::backtest_many_with_fee(&inputs, request.fee).into_iter();
    let reports = pending
        .into_iter()
        .map(|(symbol, name, failure)| {
            let result = match failure {
                Some(e) => Err(e),
                None => match results.next() {
                    Some((_, result)) => result.map_err(Error::from),
                    None => Err(Error::Data(DataIntegrityError::Empty)),
                },
            };
            SymbolReport { symbol, name, result }
        })
        .collect();
    Ok(reports)
}

/// Headline, metrics and sparkline for one symbol.
pub fn render_backtest(report: &SymbolReport, width: usize) -> String {
    let mut out = String::new();
    let backtest = match &report.result {
        Ok(bt) => bt,
        Err(e) => {
            let _ = writeln!(out, "{}: data unavailable ({e})", report.label());
            return out;
        }
    };

    let _ = writeln!(out, "{}", report.label());
    if let (Some(first), Some(last)) = (backtest.rows.first(), backtest.rows.last()) {
        let _ = writeln!(out, "  Period:          {} .. {} ({} days)", first.date(), last.date(), backtest.len());
    }
    let _ = writeln!(
        out,
        "  Cumulative:      {:>8.2}%  (hpr {:.4})",
        (backtest.final_hpr() - 1.0) * 100.0,
        backtest.final_hpr()
    );
    let _ = writeln!(out, "  Max drawdown:    {:>8.2}%", backtest.max_drawdown());
    let _ = writeln!(out, "  Trades:          {:>8}", backtest.trades());
    if let Some(stats) = backtest.stats(TRADING_DAYS) {
        let _ = writeln!(out, "  CAGR:            {:>8.2}%", stats.cagr * 100.0);
        let _ = writeln!(out, "  Sharpe:          {:>8.2}", stats.sharpe);
        let _ = writeln!(out, "  Hit rate:        {:>8.1}%", stats.hit_rate() * 100.0);
    }
    let _ = writeln!(out, "  {}", sparkline(&backtest.hpr_series(), width));
    out
}

#[derive(Serialize)]
struct ExportedBacktest<'a> {
    symbol: &'a str,
    name: Option<&'a str>,
    final_hpr: f64,
    max_drawdown: f64,
    trades: usize,
    rows: &'a [BacktestRow],
}

#[derive(Serialize)]
struct ExportedFailure<'a> {
    symbol: &'a str,
    error: String,
}

#[derive(Serialize)]
struct Export<'a> {
    backtests: Vec<ExportedBacktest<'a>>,
    unavailable: Vec<ExportedFailure<'a>>,
}

fn export_document(reports: &[SymbolReport]) -> Export<'_> {
    let mut doc = Export {
        backtests: Vec::new(),
        unavailable: Vec::new(),
    };
    for report in reports {
        match &report.result {
            Ok(bt) => doc.backtests.push(ExportedBacktest {
                symbol: &report.symbol,
                name: report.name.as_deref(),
                final_hpr: bt.final_hpr(),
                max_drawdown: bt.max_drawdown(),
                trades: bt.trades(),
                rows: &bt.rows,
            }),
            Err(e) => doc.unavailable.push(ExportedFailure {
                symbol: &report.symbol,
                error: e.to_string(),
            }),
        }
    }
    doc
}

/// Write per-day rows for every successful symbol as pretty JSON.
pub fn export_json(path: &Path, reports: &[SymbolReport]) -> Result<()> {
    let export_err = |source| Error::Export {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(export_err)?;
    }
    let file = File::create(path).map_err(export_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &export_document(reports))?;
    writer.flush().map_err(export_err)?;
    info!("wrote {}", path.display());
    Ok(())
}
