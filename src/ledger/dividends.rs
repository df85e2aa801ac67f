use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::get_decimal_value;
use crate::db::models::Dividend;

/// Load dividends of a portfolio fund ordered by record date
pub fn load_dividends(conn: &Connection, portfolio_fund_id: i64) -> Result<Vec<Dividend>> {
    let mut stmt = conn.prepare(
        "SELECT id, fund_id, portfolio_fund_id, record_date, ex_dividend_date,
                shares_owned, dividend_per_share, reinvestment_transaction_id
         FROM dividends
         WHERE portfolio_fund_id = ?1
         ORDER BY record_date ASC, id ASC",
    )?;

    let dividends = stmt
        .query_map([portfolio_fund_id], |row| {
            Ok(Dividend {
                id: Some(row.get(0)?),
                fund_id: row.get(1)?,
                portfolio_fund_id: row.get(2)?,
                record_date: row.get(3)?,
                ex_dividend_date: row.get(4)?,
                shares_owned: get_decimal_value(row, 5)?,
                dividend_per_share: get_decimal_value(row, 6)?,
                reinvestment_transaction_id: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(dividends)
}

/// Cash dividends with a record date on or before `as_of`.
///
/// Income only: reinvested shares reach the position through their own
/// ledger transaction, never through this total.
pub fn total_dividends(dividends: &[Dividend], as_of: NaiveDate) -> Decimal {
    dividends
        .iter()
        .filter(|d| d.record_date <= as_of)
        .map(Dividend::total_amount)
        .sum()
}

pub fn aggregate_dividends(conn: &Connection, portfolio_fund_id: i64, as_of: NaiveDate) -> Result<Decimal> {
    let dividends = load_dividends(conn, portfolio_fund_id)?;
    Ok(total_dividends(&dividends, as_of))
}
