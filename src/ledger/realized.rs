use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::get_decimal_value;
use crate::db::models::RealizedGainLoss;

/// Realized figures for a scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizedTotals {
    /// Σ sale proceeds − Σ cost basis
    pub realized_gain_loss: Decimal,
    pub sale_proceeds: Decimal,
    /// Cost basis of the shares that were sold
    pub original_cost_of_sold: Decimal,
}

impl RealizedTotals {
    /// Sum rows with a sell date on or before `as_of`
    pub fn from_rows(rows: &[RealizedGainLoss], as_of: NaiveDate) -> Self {
        let mut totals = RealizedTotals::default();
        for row in rows.iter().filter(|r| r.transaction_date <= as_of) {
            totals.sale_proceeds += row.sale_proceeds;
            totals.original_cost_of_sold += row.cost_basis;
        }
        totals.realized_gain_loss = totals.sale_proceeds - totals.original_cost_of_sold;
        totals
    }
}

/// Load realized gain rows for a portfolio, optionally limited to one fund
pub fn load_realized(
    conn: &Connection,
    portfolio_id: i64,
    fund_id: Option<i64>,
) -> Result<Vec<RealizedGainLoss>> {
    let mut stmt = conn.prepare(
        "SELECT id, portfolio_id, fund_id, transaction_id, transaction_date,
                shares_sold, cost_basis, sale_proceeds
         FROM realized_gain_loss
         WHERE portfolio_id = ?1 AND (?2 IS NULL OR fund_id = ?2)
         ORDER BY transaction_date ASC, id ASC",
    )?;

    let rows = stmt
        .query_map(params![portfolio_id, fund_id], |row| {
            Ok(RealizedGainLoss {
                id: Some(row.get(0)?),
                portfolio_id: row.get(1)?,
                fund_id: row.get(2)?,
                transaction_id: row.get(3)?,
                transaction_date: row.get(4)?,
                shares_sold: get_decimal_value(row, 5)?,
                cost_basis: get_decimal_value(row, 6)?,
                sale_proceeds: get_decimal_value(row, 7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Realized totals for a portfolio (or one of its funds) as of a date
pub fn aggregate_realized(
    conn: &Connection,
    portfolio_id: i64,
    fund_id: Option<i64>,
    as_of: NaiveDate,
) -> Result<RealizedTotals> {
    let rows = load_realized(conn, portfolio_id, fund_id)?;
    Ok(RealizedTotals::from_rows(&rows, as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, Fund, Transaction, TransactionType};
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn row(fund_id: i64, d: NaiveDate, cost: Decimal, proceeds: Decimal) -> RealizedGainLoss {
        RealizedGainLoss {
            id: None,
            portfolio_id: 1,
            fund_id,
            transaction_id: 1,
            transaction_date: d,
            shares_sold: dec!(1),
            cost_basis: cost,
            sale_proceeds: proceeds,
        }
    }

    #[test]
    fn test_from_rows_reports_components_separately() {
        let rows = vec![
            row(1, date(2, 1), dec!(300), dec!(450)),
            row(1, date(3, 1), dec!(200), dec!(150)),
        ];
        let totals = RealizedTotals::from_rows(&rows, date(12, 31));

        assert_eq!(totals.sale_proceeds, dec!(600));
        assert_eq!(totals.original_cost_of_sold, dec!(500));
        assert_eq!(totals.realized_gain_loss, dec!(100));
    }

    #[test]
    fn test_from_rows_ignores_later_sells() {
        let rows = vec![
            row(1, date(2, 1), dec!(300), dec!(450)),
            row(1, date(3, 1), dec!(200), dec!(150)),
        ];
        let totals = RealizedTotals::from_rows(&rows, date(2, 1));
        assert_eq!(totals.realized_gain_loss, dec!(150));

        assert_eq!(RealizedTotals::from_rows(&rows, date(1, 31)), RealizedTotals::default());
    }

    #[test]
    fn test_aggregate_realized_by_fund_and_portfolio() {
        let mut conn = db::open_in_memory().unwrap();
        let portfolio_id = db::create_portfolio(&conn, "P", None, false).unwrap();
        let mut pf_ids = Vec::new();
        for isin in ["US0000000001", "US0000000002"] {
            let fund_id = db::create_fund(
                &conn,
                &Fund {
                    id: None,
                    name: isin.to_string(),
                    symbol: None,
                    isin: isin.to_string(),
                    currency: "USD".to_string(),
                },
            )
            .unwrap();
            let pf_id = db::link_fund(&conn, portfolio_id, fund_id).unwrap();
            db::insert_transaction(
                &conn,
                &Transaction {
                    id: None,
                    portfolio_fund_id: pf_id,
                    transaction_type: TransactionType::Buy,
                    trade_date: date(1, 1),
                    shares: dec!(10),
                    cost_per_share: dec!(10),
                },
            )
            .unwrap();
            pf_ids.push((pf_id, fund_id));
        }

        db::record_sell(&mut conn, pf_ids[0].0, date(2, 1), dec!(5), dec!(12)).unwrap();
        db::record_sell(&mut conn, pf_ids[1].0, date(3, 1), dec!(5), dec!(8)).unwrap();

        let first = aggregate_realized(&conn, portfolio_id, Some(pf_ids[0].1), date(12, 31)).unwrap();
        assert_eq!(first.realized_gain_loss, dec!(10));

        let all = aggregate_realized(&conn, portfolio_id, None, date(12, 31)).unwrap();
        assert_eq!(all.realized_gain_loss, dec!(0));
        assert_eq!(all.sale_proceeds, dec!(100));
        assert_eq!(all.original_cost_of_sold, dec!(100));

        let early = aggregate_realized(&conn, portfolio_id, None, date(2, 15)).unwrap();
        assert_eq!(early.realized_gain_loss, dec!(10));
    }
}
