// Overview - the read side used by the CLI: current summaries, fund
// breakdowns and the multi-portfolio history.

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tracing::debug;

use crate::db::{self, Portfolio};
use crate::reports::history::history;
use crate::reports::summary::{FundSummary, PortfolioLedger, PortfolioSummary};

/// Summaries of every overview portfolio on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub portfolios: Vec<PortfolioSummary>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Portfolios shown in the overview: not archived, not excluded
pub fn overview_portfolios(conn: &Connection) -> Result<Vec<Portfolio>> {
    Ok(db::list_portfolios(conn)?
        .into_iter()
        .filter(Portfolio::is_in_overview)
        .collect())
}

/// Current summary of one portfolio
pub fn get_portfolio_summary(conn: &Connection, portfolio_id: i64) -> Result<PortfolioSummary> {
    get_portfolio_summary_as_of(conn, portfolio_id, today())
}

pub fn get_portfolio_summary_as_of(conn: &Connection, portfolio_id: i64, as_of: NaiveDate) -> Result<PortfolioSummary> {
    let portfolio = db::require_portfolio(conn, portfolio_id)?;
    PortfolioLedger::load(conn, portfolio)?.summary_as_of(as_of)
}

/// Current summaries of all overview portfolios
pub fn get_all_portfolio_summaries(conn: &Connection) -> Result<Vec<PortfolioSummary>> {
    get_all_portfolio_summaries_as_of(conn, today())
}

pub fn get_all_portfolio_summaries_as_of(conn: &Connection, as_of: NaiveDate) -> Result<Vec<PortfolioSummary>> {
    overview_portfolios(conn)?
        .into_iter()
        .map(|portfolio| {
            let id = portfolio.id;
            PortfolioLedger::load(conn, portfolio)?
                .summary_as_of(as_of)
                .with_context(|| format!("failed to summarize portfolio {}", id))
        })
        .collect()
}

/// Current per-fund breakdown of one portfolio
pub fn get_portfolio_fund_breakdown(conn: &Connection, portfolio_id: i64) -> Result<Vec<FundSummary>> {
    get_portfolio_fund_breakdown_as_of(conn, portfolio_id, today())
}

pub fn get_portfolio_fund_breakdown_as_of(
    conn: &Connection,
    portfolio_id: i64,
    as_of: NaiveDate,
) -> Result<Vec<FundSummary>> {
    let portfolio = db::require_portfolio(conn, portfolio_id)?;
    PortfolioLedger::load(conn, portfolio)?.fund_summaries_as_of(as_of)
}

/// Fill in missing history bounds.
///
/// Start defaults to the earliest transaction of any overview portfolio, or
/// `history_days` before `today` when there are none. End defaults to `today`.
pub fn resolve_history_range(
    conn: &Connection,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    history_days: i64,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => db::get_earliest_overview_transaction_date(conn)?
            .unwrap_or_else(|| today - Duration::days(history_days)),
    };
    Ok((start, end))
}

/// Daily summaries of the overview portfolios.
///
/// Unspecified bounds are resolved with [`resolve_history_range`].
pub fn get_portfolio_history(
    conn: &Connection,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    history_days: i64,
) -> Result<Vec<HistoryDay>> {
    let (start, end) = resolve_history_range(conn, start, end, history_days, today())?;
    get_portfolio_history_between(conn, start, end)
}

pub fn get_portfolio_history_between(conn: &Connection, start: NaiveDate, end: NaiveDate) -> Result<Vec<HistoryDay>> {
    let mut days: Vec<HistoryDay> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| HistoryDay {
            date,
            portfolios: Vec::new(),
        })
        .collect();

    for portfolio in overview_portfolios(conn)? {
        let walk = history(conn, portfolio.id, start, end)?;
        for (day, point) in days.iter_mut().zip(walk) {
            let point = point?;
            day.portfolios.push(PortfolioSummary {
                portfolio_id: portfolio.id,
                name: portfolio.name.clone(),
                description: portfolio.description.clone(),
                as_of: point.date,
                totals: point.totals,
            });
        }
    }

    debug!("Built overview history with {} days", days.len());
    Ok(days)
}

/// Summarize several portfolios in parallel, one connection per task.
///
/// Results come back in the order of `portfolio_ids`.
pub async fn summarize_portfolios_concurrently(
    db_path: PathBuf,
    portfolio_ids: Vec<i64>,
    as_of: NaiveDate,
) -> Result<Vec<PortfolioSummary>> {
    let mut join_set = JoinSet::new();

    for (idx, portfolio_id) in portfolio_ids.into_iter().enumerate() {
        let path = db_path.clone();
        join_set.spawn_blocking(move || {
            let result = db::open_db(Some(path))
                .and_then(|conn| get_portfolio_summary_as_of(&conn, portfolio_id, as_of));
            (idx, result)
        });
    }

    let mut results = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        let (idx, summary) = joined?;
        results.push((idx, summary?));
    }

    results.sort_by_key(|(idx, _)| *idx);
    Ok(results.into_iter().map(|(_, summary)| summary).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Fund, FundPrice, Transaction, TransactionType};
    use crate::error::is_not_found;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn seed(conn: &Connection, name: &str, isin: &str, exclude: bool) -> i64 {
        let portfolio_id = db::create_portfolio(conn, name, None, exclude).unwrap();
        let fund_id = db::create_fund(
            conn,
            &Fund {
                id: None,
                name: format!("{} fund", name),
                symbol: None,
                isin: isin.to_string(),
                currency: "USD".to_string(),
            },
        )
        .unwrap();
        let pf_id = db::link_fund(conn, portfolio_id, fund_id).unwrap();
        db::insert_transaction(
            conn,
            &Transaction {
                id: None,
                portfolio_fund_id: pf_id,
                transaction_type: TransactionType::Buy,
                trade_date: date(1, 2),
                shares: dec!(100),
                cost_per_share: dec!(10),
            },
        )
        .unwrap();
        db::upsert_fund_price(
            conn,
            &FundPrice {
                id: None,
                fund_id,
                price_date: date(1, 2),
                price: dec!(12),
            },
        )
        .unwrap();
        portfolio_id
    }

    #[test]
    fn test_summary_and_not_found() {
        let conn = db::open_in_memory().unwrap();
        let id = seed(&conn, "Main", "US0000000001", false);

        let summary = get_portfolio_summary_as_of(&conn, id, date(6, 1)).unwrap();
        assert_eq!(summary.totals.total_value, dec!(1200));
        assert_eq!(summary.totals.unrealized_gain_loss, dec!(200));

        assert!(is_not_found(&get_portfolio_summary(&conn, 999).unwrap_err()));
        assert!(is_not_found(&get_portfolio_fund_breakdown(&conn, 999).unwrap_err()));
    }

    #[test]
    fn test_empty_portfolio_is_zero_not_error() {
        let conn = db::open_in_memory().unwrap();
        let id = db::create_portfolio(&conn, "Empty", None, false).unwrap();

        let summary = get_portfolio_summary(&conn, id).unwrap();
        assert!(summary.totals.is_zero());
        assert!(get_portfolio_fund_breakdown(&conn, id).unwrap().is_empty());
    }

    #[test]
    fn test_overview_skips_excluded_and_archived() {
        let conn = db::open_in_memory().unwrap();
        let shown = seed(&conn, "Shown", "US0000000001", false);
        seed(&conn, "Excluded", "US0000000002", true);
        let archived = seed(&conn, "Archived", "US0000000003", false);
        db::set_portfolio_archived(&conn, archived, true).unwrap();

        let summaries = get_all_portfolio_summaries_as_of(&conn, date(6, 1)).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].portfolio_id, shown);

        // Hidden portfolios are still reachable directly
        assert!(get_portfolio_summary(&conn, archived).is_ok());
    }

    #[test]
    fn test_breakdown_lists_funds() {
        let conn = db::open_in_memory().unwrap();
        let id = seed(&conn, "Main", "US0000000001", false);

        let funds = get_portfolio_fund_breakdown_as_of(&conn, id, date(6, 1)).unwrap();
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].isin, "US0000000001");
        assert_eq!(funds[0].latest_price, Some(dec!(12)));
        assert_eq!(funds[0].average_cost, dec!(10));
    }

    #[test]
    fn test_resolve_history_range_defaults() {
        let conn = db::open_in_memory().unwrap();
        let today = date(10, 1);

        let (start, end) = resolve_history_range(&conn, None, None, 30, today).unwrap();
        assert_eq!(start, date(9, 1));
        assert_eq!(end, today);

        seed(&conn, "Main", "US0000000001", false);
        let (start, _) = resolve_history_range(&conn, None, None, 30, today).unwrap();
        assert_eq!(start, date(1, 2));

        let (start, end) = resolve_history_range(&conn, Some(date(3, 1)), Some(date(3, 2)), 30, today).unwrap();
        assert_eq!((start, end), (date(3, 1), date(3, 2)));
    }

    #[test]
    fn test_history_groups_portfolios_by_day() {
        let conn = db::open_in_memory().unwrap();
        seed(&conn, "A", "US0000000001", false);
        seed(&conn, "B", "US0000000002", false);
        seed(&conn, "Hidden", "US0000000003", true);

        let days = get_portfolio_history_between(&conn, date(1, 1), date(1, 3)).unwrap();
        assert_eq!(days.len(), 3);
        assert!(days.iter().all(|d| d.portfolios.len() == 2));
        assert!(days[0].portfolios.iter().all(|p| p.totals.is_zero()));
        assert_eq!(days[2].portfolios[1].totals.total_value, dec!(1200));

        assert!(get_portfolio_history_between(&conn, date(2, 1), date(1, 1))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_summaries_match_sequential() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("ledger.db");
        db::init_database(Some(db_path.clone())).unwrap();

        let conn = db::open_db(Some(db_path.clone())).unwrap();
        let a = seed(&conn, "A", "US0000000001", false);
        let b = seed(&conn, "B", "US0000000002", false);

        let expected: Vec<PortfolioSummary> = [b, a]
            .iter()
            .map(|id| get_portfolio_summary_as_of(&conn, *id, date(6, 1)).unwrap())
            .collect();
        drop(conn);

        let summaries = summarize_portfolios_concurrently(db_path, vec![b, a], date(6, 1))
            .await
            .unwrap();
        assert_eq!(summaries, expected);
    }
}
