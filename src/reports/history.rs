use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::{self, get_decimal_value, Portfolio};
use crate::reports::summary::{PortfolioLedger, ValuationTotals};

/// Where a history point came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointSource {
    Materialized,
    Computed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: ValuationTotals,
    pub source: PointSource,
}

/// Read the cached totals of a portfolio on a date
pub fn get_snapshot(conn: &Connection, portfolio_id: i64, date: NaiveDate) -> Result<Option<ValuationTotals>> {
    let snapshot = conn
        .query_row(
            "SELECT total_shares, total_cost, total_value, unrealized_gain_loss,
                    realized_gain_loss, total_gain_loss, total_dividends,
                    sale_proceeds, original_cost_of_sold
             FROM portfolio_snapshots
             WHERE portfolio_id = ?1 AND snapshot_date = ?2",
            params![portfolio_id, date],
            |row| {
                Ok(ValuationTotals {
                    total_shares: get_decimal_value(row, 0)?,
                    total_cost: get_decimal_value(row, 1)?,
                    total_value: get_decimal_value(row, 2)?,
                    unrealized_gain_loss: get_decimal_value(row, 3)?,
                    realized_gain_loss: get_decimal_value(row, 4)?,
                    total_gain_loss: get_decimal_value(row, 5)?,
                    total_dividends: get_decimal_value(row, 6)?,
                    sale_proceeds: get_decimal_value(row, 7)?,
                    original_cost_of_sold: get_decimal_value(row, 8)?,
                })
            },
        )
        .optional()?;

    Ok(snapshot)
}

/// Insert or replace the cached totals of a portfolio on a date
pub fn save_snapshot(conn: &Connection, portfolio_id: i64, date: NaiveDate, totals: &ValuationTotals) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO portfolio_snapshots (
            portfolio_id, snapshot_date, total_shares, total_cost, total_value,
            unrealized_gain_loss, realized_gain_loss, total_gain_loss,
            total_dividends, sale_proceeds, original_cost_of_sold, calculated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            portfolio_id,
            date,
            totals.total_shares.to_string(),
            totals.total_cost.to_string(),
            totals.total_value.to_string(),
            totals.unrealized_gain_loss.to_string(),
            totals.realized_gain_loss.to_string(),
            totals.total_gain_loss.to_string(),
            totals.total_dividends.to_string(),
            totals.sale_proceeds.to_string(),
            totals.original_cost_of_sold.to_string(),
            Utc::now(),
        ],
    )?;
    Ok(())
}

/// Drop cached snapshots of a portfolio dated on or after `from`
pub fn invalidate_snapshots_after(conn: &Connection, portfolio_id: i64, from: NaiveDate) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM portfolio_snapshots WHERE portfolio_id = ?1 AND snapshot_date >= ?2",
        params![portfolio_id, from],
    )?;
    if deleted > 0 {
        debug!(
            "Invalidated {} snapshots of portfolio {} from {}",
            deleted, portfolio_id, from
        );
    }
    Ok(deleted)
}

/// Drop cached snapshots on or after `from` for every portfolio holding a fund
pub fn invalidate_fund_snapshots_after(conn: &Connection, fund_id: i64, from: NaiveDate) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM portfolio_snapshots
         WHERE snapshot_date >= ?2
           AND portfolio_id IN (SELECT portfolio_id FROM portfolio_funds WHERE fund_id = ?1)",
        params![fund_id, from],
    )?;
    if deleted > 0 {
        debug!("Invalidated {} snapshots holding fund {} from {}", deleted, fund_id, from);
    }
    Ok(deleted)
}

/// Compute and store snapshots for every day in `[start, end]`.
///
/// Runs in one database transaction; returns the number of rows written.
pub fn materialize_snapshots(
    conn: &mut Connection,
    portfolio_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<usize> {
    let portfolio = db::require_portfolio(conn, portfolio_id)?;
    if start > end {
        return Ok(0);
    }

    let db_tx = conn.transaction()?;
    let ledger = PortfolioLedger::load(&db_tx, portfolio)?;

    let mut written = 0;
    for date in start.iter_days().take_while(|d| *d <= end) {
        let totals = ledger
            .totals_as_of(date)
            .with_context(|| format!("failed to value portfolio {} on {}", portfolio_id, date))?;
        save_snapshot(&db_tx, portfolio_id, date, &totals)?;
        written += 1;
    }
    db_tx.commit()?;

    info!(
        "Materialized {} snapshots for portfolio {} ({} to {})",
        written, portfolio_id, start, end
    );
    Ok(written)
}

/// Daily valuation history of a portfolio over an inclusive date range.
///
/// A missing portfolio is NotFound; `start > end` gives an empty history.
pub fn history(conn: &Connection, portfolio_id: i64, start: NaiveDate, end: NaiveDate) -> Result<PortfolioHistory<'_>> {
    let portfolio = db::require_portfolio(conn, portfolio_id)?;
    Ok(PortfolioHistory::new(conn, portfolio, start, end))
}

/// Lazy day-by-day walk over a portfolio's valuation.
///
/// Each date reads the snapshot cache first and falls back to computing from
/// the ledger. The ledger is loaded on the first miss and reused until the
/// walk ends or restarts. After an error the walk ends.
#[derive(Debug, Clone)]
pub struct PortfolioHistory<'a> {
    conn: &'a Connection,
    portfolio: Portfolio,
    start: NaiveDate,
    end: NaiveDate,
    next: Option<NaiveDate>,
    ledger: Option<PortfolioLedger>,
}

impl<'a> PortfolioHistory<'a> {
    fn new(conn: &'a Connection, portfolio: Portfolio, start: NaiveDate, end: NaiveDate) -> Self {
        PortfolioHistory {
            conn,
            portfolio,
            start,
            end,
            next: (start <= end).then_some(start),
            ledger: None,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Rewind to the first date. The ledger is dropped so the next walk
    /// reads the store as it is then.
    pub fn restart(&mut self) {
        self.next = (self.start <= self.end).then_some(self.start);
        self.ledger = None;
    }

    fn compute(&mut self, date: NaiveDate) -> Result<ValuationTotals> {
        let ledger = match self.ledger.take() {
            Some(ledger) => ledger,
            None => PortfolioLedger::load(self.conn, self.portfolio.clone())?,
        };
        let totals = ledger.totals_as_of(date);
        self.ledger = Some(ledger);
        totals
    }

    fn point(&mut self, date: NaiveDate) -> Result<HistoryPoint> {
        match get_snapshot(self.conn, self.portfolio.id, date) {
            Ok(Some(totals)) => {
                debug!("Snapshot hit for portfolio {} on {}", self.portfolio.id, date);
                return Ok(HistoryPoint {
                    date,
                    totals,
                    source: PointSource::Materialized,
                });
            }
            Ok(None) => {
                debug!("Snapshot miss for portfolio {} on {}", self.portfolio.id, date);
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable snapshot of portfolio {} on {}: {}",
                    self.portfolio.id, date, e
                );
            }
        }

        let totals = self
            .compute(date)
            .with_context(|| format!("failed to value portfolio {} on {}", self.portfolio.id, date))?;
        Ok(HistoryPoint {
            date,
            totals,
            source: PointSource::Computed,
        })
    }
}

impl Iterator for PortfolioHistory<'_> {
    type Item = Result<HistoryPoint>;

    fn next(&mut self) -> Option<Self::Item> {
        let date = self.next?;
        self.next = date.succ_opt().filter(|d| *d <= self.end);

        let point = self.point(date);
        if point.is_err() {
            self.next = None;
        }
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(d) => {
                let n = (self.end - d).num_days() as usize + 1;
                (n, Some(n))
            }
            None => (0, Some(0)),
        }
    }
}
