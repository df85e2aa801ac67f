use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::utils::parse_flexible_date;

pub mod formatters;

#[derive(Parser, Debug)]
#[command(name = "fundledger")]
#[command(
    version,
    about = "Fund portfolio ledger with average-cost valuation"
)]
#[command(
    long_about = "Record fund transactions, prices and dividends per portfolio, then value portfolios at any date with average-cost accounting and cached daily history."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Database file (overrides FUNDLEDGER_DB and config.toml)
    #[arg(long = "db", global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and schema
    Init,

    /// Portfolio management
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommands,
    },

    /// Fund management
    Fund {
        #[command(subcommand)]
        action: FundCommands,
    },

    /// Record transactions for a portfolio fund
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Fund price data
    Price {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Dividend records
    Dividend {
        #[command(subcommand)]
        action: DividendCommands,
    },

    /// Portfolio summaries (all overview portfolios unless --portfolio is given)
    Summary {
        /// Portfolio ID
        #[arg(short, long)]
        portfolio: Option<i64>,

        /// Valuation date (YYYY-MM-DD, YYYY-MM or YYYY; default: today)
        #[arg(long, value_parser = parse_flexible_date)]
        as_of: Option<NaiveDate>,
    },

    /// Per-fund breakdown of a portfolio
    Breakdown {
        /// Portfolio ID
        portfolio_id: i64,

        /// Valuation date (YYYY-MM-DD, YYYY-MM or YYYY; default: today)
        #[arg(long, value_parser = parse_flexible_date)]
        as_of: Option<NaiveDate>,
    },

    /// Daily valuation history
    History {
        /// Limit to one portfolio (default: all overview portfolios)
        #[arg(short, long)]
        portfolio: Option<i64>,

        /// First day (default: earliest transaction)
        #[arg(long, value_parser = parse_flexible_date)]
        from: Option<NaiveDate>,

        /// Last day (default: today)
        #[arg(long, value_parser = parse_flexible_date)]
        to: Option<NaiveDate>,
    },

    /// Snapshot cache maintenance
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PortfolioCommands {
    /// Create a portfolio
    Create {
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Leave out of the overview summaries and history
        #[arg(long)]
        exclude_from_overview: bool,
    },

    /// List portfolios
    List,

    /// Archive a portfolio (or restore it with --undo)
    Archive {
        portfolio_id: i64,

        #[arg(long)]
        undo: bool,
    },

    /// Delete a portfolio and everything recorded under it
    Delete { portfolio_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum FundCommands {
    /// Register a fund
    Create {
        name: String,

        #[arg(long)]
        isin: String,

        #[arg(long)]
        symbol: Option<String>,

        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Add a fund to a portfolio
    Link { portfolio_id: i64, fund_id: i64 },
}

/// Arguments shared by buy, sell and reinvest
#[derive(clap::Args, Debug, Clone)]
pub struct TradeArgs {
    /// Portfolio fund ID (from `fund link`)
    pub portfolio_fund_id: i64,

    /// Trade date
    #[arg(long, value_parser = parse_flexible_date)]
    pub date: NaiveDate,

    #[arg(long)]
    pub shares: Decimal,

    /// Price per share
    #[arg(long)]
    pub price: Decimal,
}

#[derive(Subcommand, Debug)]
pub enum TxCommands {
    /// Record a buy
    Buy(TradeArgs),

    /// Record a sell (realized gain computed at average cost)
    Sell(TradeArgs),

    /// Record shares bought with a dividend
    Reinvest(TradeArgs),

    /// Delete a transaction
    Delete { transaction_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum PriceCommands {
    /// Set (or replace) the price of a fund on a date
    Set {
        fund_id: i64,

        #[arg(long, value_parser = parse_flexible_date)]
        date: NaiveDate,

        #[arg(long)]
        price: Decimal,
    },
}

#[derive(Subcommand, Debug)]
pub enum DividendCommands {
    /// Record a dividend for a portfolio fund
    Add {
        portfolio_fund_id: i64,

        #[arg(long, value_parser = parse_flexible_date)]
        record_date: NaiveDate,

        #[arg(long, value_parser = parse_flexible_date)]
        ex_date: Option<NaiveDate>,

        #[arg(long)]
        shares_owned: Decimal,

        #[arg(long)]
        per_share: Decimal,

        /// Transaction that reinvested this dividend
        #[arg(long)]
        reinvestment_tx: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Recompute and store daily snapshots for a portfolio
    Refresh {
        portfolio_id: i64,

        #[arg(long, value_parser = parse_flexible_date)]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = parse_flexible_date)]
        to: Option<NaiveDate>,
    },
}
