//! CLI entry point for the kisbook dashboard.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use kisbook_broker::Market;
use kisbook_dashboard::commands::{self, BacktestOptions};
use kisbook_dashboard::config::Config;
use kisbook_dashboard::error::Error;

#[derive(Parser)]
#[command(name = "kisbook")]
#[command(about = "KIS account dashboard and volatility-breakout backtests")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum MarketArg {
    Domestic,
    Overseas,
}

impl From<MarketArg> for Market {
    fn from(arg: MarketArg) -> Self {
        match arg {
            MarketArg::Domestic => Market::Domestic,
            MarketArg::Overseas => Market::Overseas,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Show holdings and account totals
    Balance {
        #[arg(long, value_enum, default_value = "domestic")]
        market: MarketArg,
    },

    /// Suggest trades toward the configured target allocation
    Rebalance {
        #[arg(long, value_enum, default_value = "domestic")]
        market: MarketArg,
    },

    /// Run the volatility-breakout backtest
    Backtest {
        /// Only this market (default: both)
        #[arg(long, value_enum)]
        market: Option<MarketArg>,

        /// Write per-day rows as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Symbols to test instead of the configured lists
        symbols: Vec<String>,
    },

    /// Check credentials, token cache and connectivity
    Status,
}

fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    match cli.command {
        Command::Balance { market } => {
            commands::show_balance(config, market.into()).context("balance query failed")
        }
        Command::Rebalance { market } => {
            commands::show_rebalance(config, market.into()).context("rebalance failed")
        }
        Command::Backtest {
            market,
            json,
            symbols,
        } => {
            let opts = BacktestOptions {
                market: market.map(Market::from),
                symbols,
                json,
            };
            commands::run_backtest(config, &opts).context("backtest failed")
        }
        Command::Status => commands::check_status(config).context("status check failed"),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(cli, &config) {
        eprintln!("Error: {e:#}");
        let config_error = e.downcast_ref::<Error>().is_some_and(Error::is_config);
        process::exit(if config_error { 1 } else { 2 });
    }
}
