//! Command orchestration: connect, fetch, render.

use chrono::{Local, Utc};
use kisbook_broker::{
    BalanceSource, DailyPriceSource, Exchange, KisClient, Market, PortfolioSummary, TokenCache,
    fetch_holdings,
};
use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::rebalance::{compute_rebalance, unheld_targets};
use crate::report::{self, BacktestRequest, SymbolReport};
use crate::target::Targets;

/// Connect to KIS using the dashboard config.
pub fn connect(config: &Config) -> Result<KisClient> {
    let cache = TokenCache::new(config.kis.token_cache.clone());
    Ok(KisClient::connect(
        &config.client_options(),
        config.credentials()?,
        cache,
        config.account()?,
    )?)
}

/// Exchange whose balance is shown for `market`.
pub fn balance_exchange(config: &Config, market: Market) -> Exchange {
    match market {
        Market::Domestic => Exchange::Seoul,
        Market::Overseas => config.kis.overseas_exchange,
    }
}

/// Holdings table and totals for one balance source.
pub fn balance_report(source: &impl BalanceSource, currency: &str) -> Result<String> {
    let holdings = fetch_holdings(source)?;
    let summary = PortfolioSummary::from_holdings(&holdings);
    let mut out = String::from("HOLDINGS:\n");
    out.push_str(&report::render_holdings(&holdings, currency));
    out.push_str("\nTOTALS:\n");
    out.push_str(&report::render_summary(&summary, currency));
    Ok(out)
}

/// Rebalancing table for one balance source against `targets`.
pub fn rebalance_report(
    source: &impl BalanceSource,
    targets: &Targets,
    currency: &str,
) -> Result<String> {
    let holdings = fetch_holdings(source)?;
    let lines = compute_rebalance(&holdings, targets);
    let unheld = unheld_targets(&holdings, targets);
    let mut out = String::from("REBALANCE SUGGESTIONS:\n");
    out.push_str(&report::render_rebalance(&lines, &unheld, currency));
    Ok(out)
}

/// Backtest `symbols` against one price source and render every result.
pub fn backtest_report(
    source: &impl DailyPriceSource,
    symbols: &[String],
    request: &BacktestRequest,
) -> Result<(String, Vec<SymbolReport>)> {
    let reports = report::run_backtests(source, symbols, request)?;
    let mut out = String::new();
    for r in &reports {
        out.push_str(&report::render_backtest(r, report::SPARKLINE_WIDTH));
        out.push('\n');
    }
    Ok((out, reports))
}

pub fn show_balance(config: &Config, market: Market) -> Result<()> {
    let client = connect(config)?;
    let exchange = balance_exchange(config, market);
    let source = client.balances(exchange)?;
    println!("{exchange} balance ({}):\n", source.tr_id());
    print!("{}", balance_report(&source, exchange.currency())?);
    Ok(())
}

pub fn show_rebalance(config: &Config, market: Market) -> Result<()> {
    let client = connect(config)?;
    let exchange = balance_exchange(config, market);
    let source = client.balances(exchange)?;
    let targets = config.targets.for_market(market);
    if targets.is_empty() {
        println!("No {market} targets configured.");
        return Ok(());
    }
    print!("{}", rebalance_report(&source, targets, exchange.currency())?);
    Ok(())
}

/// Options for a backtest run.
pub struct BacktestOptions {
    pub market: Option<Market>,
    /// Replaces the configured symbol lists when non-empty.
    pub symbols: Vec<String>,
    pub json: Option<std::path::PathBuf>,
}

pub fn run_backtest(config: &Config, opts: &BacktestOptions) -> Result<()> {
    let bt = &config.backtest;
    let request = BacktestRequest {
        start: bt.start,
        end: config.backtest_end(Local::now().date_naive()),
        chunk_days: bt.chunk_days,
        fee: bt.fee,
    };
    let client = connect(config)?;

    let markets: &[Market] = match opts.market {
        Some(Market::Domestic) => &[Market::Domestic],
        Some(Market::Overseas) => &[Market::Overseas],
        None => &[Market::Domestic, Market::Overseas],
    };

    let mut all = Vec::new();
    for &market in markets {
        let (exchange, configured) = match market {
            Market::Domestic => (Exchange::Seoul, &bt.domestic),
            Market::Overseas => (bt.overseas_exchange, &bt.overseas),
        };
        let symbols = if opts.symbols.is_empty() {
            configured
        } else {
            &opts.symbols
        };
        if symbols.is_empty() {
            continue;
        }
        info!(
            "backtesting {} {market} symbols from {} to {}",
            symbols.len(),
            request.start,
            request.end
        );
        println!("{market} ({exchange}):\n");
        let (text, reports) = backtest_report(&client.prices(exchange), symbols, &request)?;
        print!("{text}");
        all.extend(reports);
    }

    if all.is_empty() {
        println!("No symbols to backtest.");
    }
    if let Some(path) = &opts.json {
        report::export_json(path, &all)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Check credentials and the token cache.
pub fn check_status(config: &Config) -> Result<()> {
    let options = config.client_options();
    println!(
        "Environment: {} ({})",
        if options.mock { "mock" } else { "real" },
        options.base_url()
    );
    match config.account()? {
        Some(account) => println!("Account: {account}"),
        None => println!("Account: (not configured)"),
    }

    print!("Connecting... ");
    let client = connect(config)?;
    println!("OK");

    let token = client.token();
    let remaining = token.expires_at - Utc::now();
    println!(
        "Token valid until {} ({}h {}m left), cached at {}",
        token.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
        remaining.num_hours(),
        remaining.num_minutes() % 60,
        config.kis.token_cache.display()
    );
    Ok(())
}
