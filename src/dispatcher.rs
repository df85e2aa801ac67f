//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Every handler receives a [`Context`] carrying the resolved settings and
//! the output mode, and opens its own connection.

mod ledger;
mod portfolio;
mod reports;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::config::Settings;
use crate::db;

/// Per-invocation state shared by the handlers
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub json: bool,
}

impl Context {
    pub fn db_path(&self) -> &Path {
        &self.settings.database_path
    }

    /// Open the database, creating the schema on first use
    pub fn connect(&self) -> Result<Connection> {
        let path = self.db_path().to_path_buf();
        if !path.exists() {
            db::init_database(Some(path.clone()))?;
        }
        let conn = db::open_db(Some(path))?;
        db::init_schema(&conn)?;
        Ok(conn)
    }

    pub fn symbol(&self) -> &str {
        &self.settings.currency_symbol
    }

    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Route a parsed command line to its handler
pub async fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::load()?.with_database_path(cli.db);
    let ctx = Context {
        settings,
        json: cli.json,
    };

    match cli.command {
        Commands::Init => {
            db::init_database(Some(ctx.db_path().to_path_buf()))?;
            info!("Database ready at {:?}", ctx.db_path());
            if ctx.json {
                println!(
                    "{}",
                    serde_json::json!({ "database": ctx.db_path().display().to_string() })
                );
            } else {
                println!("Database initialized at {}", ctx.db_path().display());
            }
            Ok(())
        }
        Commands::Portfolio { action } => portfolio::dispatch_portfolio(&ctx, action),
        Commands::Fund { action } => ledger::dispatch_fund(&ctx, action),
        Commands::Tx { action } => ledger::dispatch_tx(&ctx, action),
        Commands::Price { action } => ledger::dispatch_price(&ctx, action),
        Commands::Dividend { action } => ledger::dispatch_dividend(&ctx, action),
        Commands::Summary { portfolio, as_of } => {
            reports::dispatch_summary(&ctx, portfolio, as_of).await
        }
        Commands::Breakdown {
            portfolio_id,
            as_of,
        } => reports::dispatch_breakdown(&ctx, portfolio_id, as_of),
        Commands::History {
            portfolio,
            from,
            to,
        } => reports::dispatch_history(&ctx, portfolio, from, to),
        Commands::Snapshot { action } => reports::dispatch_snapshot(&ctx, action),
    }
}
