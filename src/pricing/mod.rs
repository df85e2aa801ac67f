// Pricing module - as-of-date price resolution

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use crate::db::get_decimal_value;
use crate::db::models::FundPrice;

/// Get the latest price of a fund on or before a date.
///
/// `None` is not an error: the fund contributes zero value while its
/// cost basis stays computable.
pub fn resolve_price(conn: &Connection, fund_id: i64, as_of: NaiveDate) -> Result<Option<Decimal>> {
    let mut stmt = conn.prepare(
        "SELECT price FROM fund_prices
         WHERE fund_id = ?1 AND price_date <= ?2
         ORDER BY price_date DESC
         LIMIT 1",
    )?;

    let price = stmt
        .query_row(params![fund_id, as_of], |row| get_decimal_value(row, 0))
        .optional()?;

    if price.is_none() {
        debug!("No price for fund {} on or before {}", fund_id, as_of);
    }
    Ok(price)
}

/// Load every price observation of a fund, oldest first
pub fn load_prices(conn: &Connection, fund_id: i64) -> Result<Vec<FundPrice>> {
    let mut stmt = conn.prepare(
        "SELECT id, fund_id, price_date, price FROM fund_prices
         WHERE fund_id = ?1
         ORDER BY price_date ASC",
    )?;

    let prices = stmt
        .query_map([fund_id], |row| {
            Ok(FundPrice {
                id: Some(row.get(0)?),
                fund_id: row.get(1)?,
                price_date: row.get(2)?,
                price: get_decimal_value(row, 3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(prices)
}

/// In-memory price series of one fund.
///
/// Answers the same question as [`resolve_price`] without a query per
/// date, which matters when a history walks hundreds of days.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    points: Vec<(NaiveDate, Decimal)>,
}

impl PriceTable {
    pub fn load(conn: &Connection, fund_id: i64) -> Result<Self> {
        Ok(Self::from_prices(load_prices(conn, fund_id)?))
    }

    pub fn from_prices(prices: Vec<FundPrice>) -> Self {
        let mut points: Vec<(NaiveDate, Decimal)> =
            prices.into_iter().map(|p| (p.price_date, p.price)).collect();
        points.sort_by_key(|(date, _)| *date);
        // One observation per date; keep the last one seen
        points.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });
        Self { points }
    }

    pub fn price_on_or_before(&self, as_of: NaiveDate) -> Option<Decimal> {
        let idx = self.points.partition_point(|(date, _)| *date <= as_of);
        idx.checked_sub(1).map(|i| self.points[i].1)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}
