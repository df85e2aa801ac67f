//! Ledger reading and replay
//!
//! The ledger is the append-only list of transactions of a portfolio fund.
//! Running balances are never stored; they are derived by replaying the
//! ledger through [`cost_basis::CostBasisTracker`].

pub mod cost_basis;
pub mod dividends;
pub mod realized;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::db::get_decimal_value;
use crate::db::models::{Transaction, TransactionType};
use crate::error::ValuationError;

pub use cost_basis::CostBasisTracker;
pub use dividends::{aggregate_dividends, load_dividends, total_dividends};
pub use realized::{aggregate_realized, load_realized, RealizedTotals};

const TRANSACTION_COLUMNS: &str =
    "id, portfolio_fund_id, transaction_type, trade_date, shares, cost_per_share";

type RawTransaction = (i64, i64, String, NaiveDate, Decimal, Decimal);

fn read_raw(row: &rusqlite::Row) -> Result<RawTransaction, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        get_decimal_value(row, 4)?,
        get_decimal_value(row, 5)?,
    ))
}

fn into_transaction(raw: RawTransaction) -> Result<Transaction> {
    let (id, portfolio_fund_id, tx_type, trade_date, shares, cost_per_share) = raw;
    let transaction_type = tx_type.parse::<TransactionType>().map_err(|_| {
        ValuationError::DataIntegrity(format!(
            "unknown transaction type '{}' in transaction {}",
            tx_type, id
        ))
    })?;

    Ok(Transaction {
        id: Some(id),
        portfolio_fund_id,
        transaction_type,
        trade_date,
        shares,
        cost_per_share,
    })
}

/// Get all transactions of a portfolio fund, ordered by date then insertion order
pub fn load_transactions(conn: &Connection, portfolio_fund_id: i64) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transactions
         WHERE portfolio_fund_id = ?1
         ORDER BY trade_date ASC, id ASC",
        TRANSACTION_COLUMNS
    ))?;

    let raw = stmt
        .query_map([portfolio_fund_id], read_raw)?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter().map(into_transaction).collect()
}

/// Same as `load_transactions`, limited to trade dates on or before `as_of`
pub fn load_transactions_as_of(
    conn: &Connection,
    portfolio_fund_id: i64,
    as_of: NaiveDate,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transactions
         WHERE portfolio_fund_id = ?1 AND trade_date <= ?2
         ORDER BY trade_date ASC, id ASC",
        TRANSACTION_COLUMNS
    ))?;

    let raw = stmt
        .query_map(params![portfolio_fund_id, as_of], read_raw)?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter().map(into_transaction).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::is_data_integrity;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Connection, i64) {
        let conn = db::open_in_memory().unwrap();
        let portfolio_id = db::create_portfolio(&conn, "P", None, false).unwrap();
        let fund_id = db::create_fund(
            &conn,
            &db::Fund {
                id: None,
                name: "Fund".to_string(),
                symbol: None,
                isin: "NL0000000001".to_string(),
                currency: "EUR".to_string(),
            },
        )
        .unwrap();
        let pf_id = db::link_fund(&conn, portfolio_id, fund_id).unwrap();
        (conn, pf_id)
    }

    fn buy(pf_id: i64, d: NaiveDate, shares: Decimal) -> Transaction {
        Transaction {
            id: None,
            portfolio_fund_id: pf_id,
            transaction_type: TransactionType::Buy,
            trade_date: d,
            shares,
            cost_per_share: dec!(10),
        }
    }

    #[test]
    fn test_transactions_ordered_by_date_then_insertion() {
        let (conn, pf_id) = setup();
        db::insert_transaction(&conn, &buy(pf_id, date(2024, 3, 1), dec!(3))).unwrap();
        db::insert_transaction(&conn, &buy(pf_id, date(2024, 1, 1), dec!(1))).unwrap();
        db::insert_transaction(&conn, &buy(pf_id, date(2024, 3, 1), dec!(4))).unwrap();
        db::insert_transaction(&conn, &buy(pf_id, date(2024, 2, 1), dec!(2))).unwrap();

        let shares: Vec<Decimal> = load_transactions(&conn, pf_id)
            .unwrap()
            .iter()
            .map(|t| t.shares)
            .collect();
        assert_eq!(shares, vec![dec!(1), dec!(2), dec!(3), dec!(4)]);
    }

    #[test]
    fn test_as_of_is_inclusive() {
        let (conn, pf_id) = setup();
        db::insert_transaction(&conn, &buy(pf_id, date(2024, 1, 1), dec!(1))).unwrap();
        db::insert_transaction(&conn, &buy(pf_id, date(2024, 2, 1), dec!(2))).unwrap();

        assert_eq!(load_transactions_as_of(&conn, pf_id, date(2024, 2, 1)).unwrap().len(), 2);
        assert_eq!(load_transactions_as_of(&conn, pf_id, date(2024, 1, 31)).unwrap().len(), 1);
        assert!(load_transactions_as_of(&conn, pf_id, date(2023, 12, 31)).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_type_is_data_integrity() {
        let (conn, pf_id) = setup();
        // Bypass the CHECK constraint the way a broken migration would
        conn.execute_batch("PRAGMA ignore_check_constraints = ON").unwrap();
        conn.execute(
            "INSERT INTO transactions (portfolio_fund_id, transaction_type, trade_date, shares, cost_per_share)
             VALUES (?1, 'TRANSFER', '2024-01-01', '1', '1')",
            [pf_id],
        )
        .unwrap();

        let err = load_transactions(&conn, pf_id).unwrap_err();
        assert!(is_data_integrity(&err));
    }
}
