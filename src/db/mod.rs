// Database module - SQLite connection, schema and the recording layer

pub mod models;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::ValuationError;
use crate::ledger;
use crate::ledger::cost_basis::CostBasisTracker;
use crate::reports::history::{invalidate_fund_snapshots_after, invalidate_snapshots_after};
pub use models::{
    Dividend, Fund, FundPrice, Portfolio, PortfolioFund, RealizedGainLoss, Transaction,
    TransactionType,
};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Get the database path from settings (~/.fundledger/data.db by default)
pub fn get_default_db_path() -> Result<PathBuf> {
    Ok(Settings::load()?.database_path)
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Apply the schema to an open connection (idempotent)
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)
        .context("Failed to execute schema")
}

/// Initialize the database with schema
///
/// This function creates the database file and runs the schema SQL
/// to set up all tables and indexes.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory {:?}", parent))?;
        }
    }

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    init_schema(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Open an in-memory database with the schema applied
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

// ---------------------------------------------------------------------------
// Portfolios
// ---------------------------------------------------------------------------

/// Create a portfolio, returns portfolio_id
pub fn create_portfolio(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    exclude_from_overview: bool,
) -> Result<i64> {
    if name.trim().is_empty() {
        return Err(ValuationError::Validation("portfolio name is empty".to_string()).into());
    }

    conn.execute(
        "INSERT INTO portfolios (name, description, exclude_from_overview) VALUES (?1, ?2, ?3)",
        params![name.trim(), description, exclude_from_overview],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Update name, description and overview flag of a portfolio
pub fn update_portfolio(
    conn: &Connection,
    portfolio_id: i64,
    name: &str,
    description: Option<&str>,
    exclude_from_overview: bool,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE portfolios
         SET name = ?1, description = ?2, exclude_from_overview = ?3, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?4",
        params![name.trim(), description, exclude_from_overview, portfolio_id],
    )?;

    if updated == 0 {
        return Err(ValuationError::portfolio_not_found(portfolio_id).into());
    }
    Ok(())
}

pub fn set_portfolio_archived(conn: &Connection, portfolio_id: i64, archived: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE portfolios SET is_archived = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![archived, portfolio_id],
    )?;

    if updated == 0 {
        return Err(ValuationError::portfolio_not_found(portfolio_id).into());
    }
    Ok(())
}

/// Delete a portfolio; links, transactions, dividends, realized gains
/// and snapshots go with it.
pub fn delete_portfolio(conn: &Connection, portfolio_id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM portfolios WHERE id = ?1", [portfolio_id])?;
    if deleted == 0 {
        return Err(ValuationError::portfolio_not_found(portfolio_id).into());
    }
    info!("Deleted portfolio {}", portfolio_id);
    Ok(())
}

fn map_portfolio(row: &rusqlite::Row) -> Result<Portfolio, rusqlite::Error> {
    Ok(Portfolio {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_archived: row.get(3)?,
        exclude_from_overview: row.get(4)?,
    })
}

/// Look up a portfolio by id. `None` means it does not exist.
pub fn get_portfolio(conn: &Connection, portfolio_id: i64) -> Result<Option<Portfolio>> {
    let portfolio = conn
        .query_row(
            "SELECT id, name, description, is_archived, exclude_from_overview
             FROM portfolios WHERE id = ?1",
            [portfolio_id],
            map_portfolio,
        )
        .optional()?;

    Ok(portfolio)
}

/// Like `get_portfolio`, but a missing portfolio is a NotFound error
pub fn require_portfolio(conn: &Connection, portfolio_id: i64) -> Result<Portfolio> {
    get_portfolio(conn, portfolio_id)?
        .ok_or_else(|| ValuationError::portfolio_not_found(portfolio_id).into())
}

/// List all portfolios ordered by id
pub fn list_portfolios(conn: &Connection) -> Result<Vec<Portfolio>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, is_archived, exclude_from_overview
         FROM portfolios ORDER BY id",
    )?;

    let portfolios = stmt
        .query_map([], map_portfolio)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(portfolios)
}

// ---------------------------------------------------------------------------
// Funds and links
// ---------------------------------------------------------------------------

/// Insert a fund, returns fund_id. ISINs are unique.
pub fn create_fund(conn: &Connection, fund: &Fund) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM funds WHERE isin = ?1", [&fund.isin], |row| {
            row.get(0)
        })
        .optional()?;

    if let Some(id) = existing {
        return Err(ValuationError::Duplicate(format!(
            "fund with ISIN {} already exists (id {})",
            fund.isin, id
        ))
        .into());
    }

    conn.execute(
        "INSERT INTO funds (name, symbol, isin, currency) VALUES (?1, ?2, ?3, ?4)",
        params![fund.name, fund.symbol, fund.isin, fund.currency],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_fund(conn: &Connection, fund_id: i64) -> Result<Option<Fund>> {
    let fund = conn
        .query_row(
            "SELECT id, name, symbol, isin, currency FROM funds WHERE id = ?1",
            [fund_id],
            |row| {
                Ok(Fund {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    symbol: row.get(2)?,
                    isin: row.get(3)?,
                    currency: row.get(4)?,
                })
            },
        )
        .optional()?;

    Ok(fund)
}

/// Link a fund to a portfolio, returns portfolio_fund_id.
/// A portfolio may hold the same fund at most once.
pub fn link_fund(conn: &Connection, portfolio_id: i64, fund_id: i64) -> Result<i64> {
    require_portfolio(conn, portfolio_id)?;
    if get_fund(conn, fund_id)?.is_none() {
        return Err(ValuationError::fund_not_found(fund_id).into());
    }

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM portfolio_funds WHERE portfolio_id = ?1 AND fund_id = ?2",
        params![portfolio_id, fund_id],
        |row| row.get(0),
    )?;

    if count > 0 {
        return Err(ValuationError::Duplicate(format!(
            "fund {} is already linked to portfolio {}",
            fund_id, portfolio_id
        ))
        .into());
    }

    conn.execute(
        "INSERT INTO portfolio_funds (portfolio_id, fund_id) VALUES (?1, ?2)",
        params![portfolio_id, fund_id],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_portfolio_fund(conn: &Connection, portfolio_fund_id: i64) -> Result<Option<PortfolioFund>> {
    let pf = conn
        .query_row(
            "SELECT id, portfolio_id, fund_id FROM portfolio_funds WHERE id = ?1",
            [portfolio_fund_id],
            |row| {
                Ok(PortfolioFund {
                    id: row.get(0)?,
                    portfolio_id: row.get(1)?,
                    fund_id: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(pf)
}

fn require_portfolio_fund(conn: &Connection, portfolio_fund_id: i64) -> Result<PortfolioFund> {
    get_portfolio_fund(conn, portfolio_fund_id)?.ok_or_else(|| {
        ValuationError::NotFound {
            entity: "portfolio fund",
            id: portfolio_fund_id,
        }
        .into()
    })
}

/// List the funds linked to a portfolio with fund details
pub fn list_portfolio_funds(conn: &Connection, portfolio_id: i64) -> Result<Vec<(PortfolioFund, Fund)>> {
    let mut stmt = conn.prepare(
        "SELECT pf.id, pf.portfolio_id, pf.fund_id,
                f.id, f.name, f.symbol, f.isin, f.currency
         FROM portfolio_funds pf
         JOIN funds f ON pf.fund_id = f.id
         WHERE pf.portfolio_id = ?1
         ORDER BY pf.id",
    )?;

    let results = stmt
        .query_map([portfolio_id], |row| {
            Ok((
                PortfolioFund {
                    id: row.get(0)?,
                    portfolio_id: row.get(1)?,
                    fund_id: row.get(2)?,
                },
                Fund {
                    id: Some(row.get(3)?),
                    name: row.get(4)?,
                    symbol: row.get(5)?,
                    isin: row.get(6)?,
                    currency: row.get(7)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

fn validate_amounts(shares: Decimal, cost_per_share: Decimal) -> Result<()> {
    if shares <= Decimal::ZERO {
        return Err(ValuationError::Validation(format!("shares must be positive, got {}", shares)).into());
    }
    if cost_per_share < Decimal::ZERO {
        return Err(ValuationError::Validation(format!(
            "cost per share must not be negative, got {}",
            cost_per_share
        ))
        .into());
    }
    Ok(())
}

fn insert_transaction_row(conn: &Connection, tx: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (
            portfolio_fund_id, transaction_type, trade_date, shares, cost_per_share
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tx.portfolio_fund_id,
            tx.transaction_type.as_str(),
            tx.trade_date,
            tx.shares.to_string(),
            tx.cost_per_share.to_string(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Fail with a Validation error when the stored ledger of a portfolio fund
/// no longer replays, so a write never leaves an oversold position behind.
fn ensure_replayable(conn: &Connection, portfolio_fund_id: i64, action: &str) -> Result<()> {
    let transactions = ledger::load_transactions(conn, portfolio_fund_id)?;
    match CostBasisTracker::replay(&transactions, None) {
        Ok(_) => Ok(()),
        Err(e) => match e.downcast_ref::<ValuationError>() {
            Some(ValuationError::DataIntegrity(reason)) => {
                Err(ValuationError::Validation(format!("cannot {}: {}", action, reason)).into())
            }
            _ => Err(e),
        },
    }
}

/// Insert a buy or dividend-reinvestment transaction.
///
/// Sells must go through `record_sell` so the realized gain row is written
/// in the same database transaction.
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    if tx.transaction_type == TransactionType::Sell {
        return Err(ValuationError::Validation(
            "sell transactions must be recorded with record_sell".to_string(),
        )
        .into());
    }
    validate_amounts(tx.shares, tx.cost_per_share)?;
    let pf = require_portfolio_fund(conn, tx.portfolio_fund_id)?;

    let id = insert_transaction_row(conn, tx)?;
    invalidate_snapshots_after(conn, pf.portfolio_id, tx.trade_date)?;

    debug!(
        "Recorded {} of {} shares on {} for portfolio fund {}",
        tx.transaction_type.as_str(),
        tx.shares,
        tx.trade_date,
        tx.portfolio_fund_id
    );
    Ok(id)
}

/// Record a sell and its realized gain/loss atomically.
///
/// The cost basis of the sold shares is the average cost of the position
/// replayed up to and including `trade_date`. A backdated sell is also
/// checked against every later sell, and rejected if one of them would
/// end up selling more than is held.
pub fn record_sell(
    conn: &mut Connection,
    portfolio_fund_id: i64,
    trade_date: NaiveDate,
    shares: Decimal,
    price_per_share: Decimal,
) -> Result<(i64, RealizedGainLoss)> {
    validate_amounts(shares, price_per_share)?;

    let db_tx = conn.transaction()?;
    let pf = require_portfolio_fund(&db_tx, portfolio_fund_id)?;

    let history = ledger::load_transactions_as_of(&db_tx, portfolio_fund_id, trade_date)?;
    let mut tracker = CostBasisTracker::replay(&history, None)?;

    if shares > tracker.total_shares() {
        return Err(ValuationError::Validation(format!(
            "cannot sell {} shares on {}: only {} held",
            shares,
            trade_date,
            tracker.total_shares()
        ))
        .into());
    }

    let cost_basis = tracker.apply_sell(shares, trade_date)?;

    let sell = Transaction {
        id: None,
        portfolio_fund_id,
        transaction_type: TransactionType::Sell,
        trade_date,
        shares,
        cost_per_share: price_per_share,
    };
    let transaction_id = insert_transaction_row(&db_tx, &sell)?;
    ensure_replayable(
        &db_tx,
        portfolio_fund_id,
        &format!("sell {} shares on {}", shares, trade_date),
    )?;

    let mut realized = RealizedGainLoss {
        id: None,
        portfolio_id: pf.portfolio_id,
        fund_id: pf.fund_id,
        transaction_id,
        transaction_date: trade_date,
        shares_sold: shares,
        cost_basis,
        sale_proceeds: sell.amount(),
    };

    db_tx.execute(
        "INSERT INTO realized_gain_loss (
            portfolio_id, fund_id, transaction_id, transaction_date,
            shares_sold, cost_basis, sale_proceeds
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            realized.portfolio_id,
            realized.fund_id,
            realized.transaction_id,
            realized.transaction_date,
            realized.shares_sold.to_string(),
            realized.cost_basis.to_string(),
            realized.sale_proceeds.to_string(),
        ],
    )?;
    realized.id = Some(db_tx.last_insert_rowid());

    invalidate_snapshots_after(&db_tx, pf.portfolio_id, trade_date)?;
    db_tx.commit()?;

    info!(
        "Recorded sell of {} shares on {} (cost basis {}, proceeds {})",
        shares, trade_date, realized.cost_basis, realized.sale_proceeds
    );
    Ok((transaction_id, realized))
}

/// Delete a transaction; a sell takes its realized gain row with it.
///
/// Removing a buy that a later sell depends on is rejected and nothing
/// is deleted.
pub fn delete_transaction(conn: &mut Connection, transaction_id: i64) -> Result<()> {
    let db_tx = conn.transaction()?;
    let found: Option<(i64, i64, NaiveDate)> = db_tx
        .query_row(
            "SELECT pf.portfolio_id, t.portfolio_fund_id, t.trade_date
             FROM transactions t
             JOIN portfolio_funds pf ON t.portfolio_fund_id = pf.id
             WHERE t.id = ?1",
            [transaction_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let (portfolio_id, portfolio_fund_id, trade_date) = found.ok_or(ValuationError::NotFound {
        entity: "transaction",
        id: transaction_id,
    })?;

    db_tx.execute("DELETE FROM transactions WHERE id = ?1", [transaction_id])?;
    ensure_replayable(
        &db_tx,
        portfolio_fund_id,
        &format!("delete transaction {}", transaction_id),
    )?;
    invalidate_snapshots_after(&db_tx, portfolio_id, trade_date)?;
    db_tx.commit()?;

    debug!("Deleted transaction {} of portfolio fund {}", transaction_id, portfolio_fund_id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Prices and dividends
// ---------------------------------------------------------------------------

/// Insert or replace the price of a fund on a date
pub fn upsert_fund_price(conn: &Connection, price: &FundPrice) -> Result<i64> {
    if price.price < Decimal::ZERO {
        return Err(ValuationError::Validation(format!("negative price {}", price.price)).into());
    }
    if get_fund(conn, price.fund_id)?.is_none() {
        return Err(ValuationError::fund_not_found(price.fund_id).into());
    }

    conn.execute(
        "INSERT OR REPLACE INTO fund_prices (fund_id, price_date, price) VALUES (?1, ?2, ?3)",
        params![price.fund_id, price.price_date, price.price.to_string()],
    )?;
    let id = conn.last_insert_rowid();

    invalidate_fund_snapshots_after(conn, price.fund_id, price.price_date)?;
    Ok(id)
}

/// Insert a dividend for a portfolio fund
pub fn insert_dividend(conn: &Connection, dividend: &Dividend) -> Result<i64> {
    let pf = require_portfolio_fund(conn, dividend.portfolio_fund_id)?;
    if pf.fund_id != dividend.fund_id {
        return Err(ValuationError::Validation(format!(
            "dividend fund {} does not match portfolio fund {} (fund {})",
            dividend.fund_id, pf.id, pf.fund_id
        ))
        .into());
    }
    if dividend.shares_owned < Decimal::ZERO || dividend.dividend_per_share < Decimal::ZERO {
        return Err(ValuationError::Validation(
            "dividend shares and amount must not be negative".to_string(),
        )
        .into());
    }

    conn.execute(
        "INSERT INTO dividends (
            fund_id, portfolio_fund_id, record_date, ex_dividend_date,
            shares_owned, dividend_per_share, reinvestment_transaction_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            dividend.fund_id,
            dividend.portfolio_fund_id,
            dividend.record_date,
            dividend.ex_dividend_date,
            dividend.shares_owned.to_string(),
            dividend.dividend_per_share.to_string(),
            dividend.reinvestment_transaction_id,
        ],
    )?;
    let id = conn.last_insert_rowid();

    invalidate_snapshots_after(conn, pf.portfolio_id, dividend.record_date)?;
    Ok(id)
}

/// Earliest transaction date across portfolios shown in the overview
pub fn get_earliest_overview_transaction_date(conn: &Connection) -> Result<Option<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT MIN(t.trade_date)
         FROM transactions t
         JOIN portfolio_funds pf ON t.portfolio_fund_id = pf.id
         JOIN portfolios p ON pf.portfolio_id = p.id
         WHERE p.is_archived = 0 AND p.exclude_from_overview = 0",
    )?;

    // MIN() returns a single row with NULL when nothing matches; map NULL to None
    let result: Option<Option<NaiveDate>> = stmt.query_row([], |row| row.get(0)).optional()?;

    Ok(result.flatten())
}

/// Helper to read Decimal from SQLite (handles both INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Real, Box::new(e))
        }),
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}
