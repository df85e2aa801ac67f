// Read-side commands: summaries, breakdowns, history and snapshot refresh

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use colored::Colorize;
use rusqlite::Connection;
use tracing::info;

use super::Context;
use crate::cli::{formatters, SnapshotCommands};
use crate::db;
use crate::reports::overview;
use crate::reports::summary::PortfolioLedger;
use crate::reports::{history, materialize_snapshots, HistoryPoint};

pub async fn dispatch_summary(ctx: &Context, portfolio: Option<i64>, as_of: Option<NaiveDate>) -> Result<()> {
    let as_of = as_of.unwrap_or_else(|| ctx.today());
    let conn = ctx.connect()?;

    let summaries = match portfolio {
        Some(id) => vec![overview::get_portfolio_summary_as_of(&conn, id, as_of)?],
        None => {
            let ids: Vec<i64> = overview::overview_portfolios(&conn)?
                .iter()
                .map(|p| p.id)
                .collect();
            drop(conn);
            overview::summarize_portfolios_concurrently(ctx.db_path().to_path_buf(), ids, as_of).await?
        }
    };

    if ctx.json {
        match portfolio {
            Some(_) => println!("{}", formatters::to_json(&summaries[0])),
            None => println!("{}", formatters::to_json(&summaries)),
        }
        return Ok(());
    }

    if summaries.is_empty() {
        print!("{}", formatters::format_empty("portfolios"));
        return Ok(());
    }

    println!("{}", formatters::format_summaries_table(&summaries, ctx.symbol()));
    Ok(())
}

pub fn dispatch_breakdown(ctx: &Context, portfolio_id: i64, as_of: Option<NaiveDate>) -> Result<()> {
    let as_of = as_of.unwrap_or_else(|| ctx.today());
    let conn = ctx.connect()?;

    let portfolio = db::require_portfolio(&conn, portfolio_id)?;
    let ledger = PortfolioLedger::load(&conn, portfolio)?;
    let funds = ledger.fund_summaries_as_of(as_of)?;
    let summary = ledger.summary_as_of(as_of)?;

    if ctx.json {
        let payload = serde_json::json!({ "portfolio": summary, "funds": funds });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if funds.is_empty() {
        println!("{} Portfolio {} holds no funds", "ℹ".blue().bold(), summary.name);
        return Ok(());
    }

    println!("{}", formatters::format_breakdown_table(&summary, &funds, ctx.symbol()));
    Ok(())
}

/// Default range for a single portfolio: its first trade through today
fn portfolio_range(
    ctx: &Context,
    conn: &Connection,
    portfolio_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate)> {
    let today = ctx.today();
    let start = match from {
        Some(d) => d,
        None => {
            let portfolio = db::require_portfolio(conn, portfolio_id)?;
            PortfolioLedger::load(conn, portfolio)?
                .first_trade_date()
                .unwrap_or_else(|| today - Duration::days(ctx.settings.history_days))
        }
    };
    Ok((start, to.unwrap_or(today)))
}

pub fn dispatch_history(
    ctx: &Context,
    portfolio: Option<i64>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let conn = ctx.connect()?;

    match portfolio {
        Some(id) => {
            let (start, end) = portfolio_range(ctx, &conn, id, from, to)?;
            let points = history(&conn, id, start, end)?.collect::<Result<Vec<HistoryPoint>>>()?;

            if ctx.json {
                println!("{}", formatters::to_json(&points));
            } else if points.is_empty() {
                println!("{} No days between {} and {}", "ℹ".blue().bold(), start, end);
            } else {
                println!("{}", formatters::format_history_table(&points, ctx.symbol()));
            }
        }
        None => {
            let days = overview::get_portfolio_history(&conn, from, to, ctx.settings.history_days)?;

            if ctx.json {
                println!("{}", formatters::to_json(&days));
            } else if days.is_empty() {
                println!("{} No days in the requested range", "ℹ".blue().bold());
            } else {
                println!("{}", formatters::format_overview_history_table(&days, ctx.symbol()));
            }
        }
    }
    Ok(())
}

pub fn dispatch_snapshot(ctx: &Context, action: SnapshotCommands) -> Result<()> {
    match action {
        SnapshotCommands::Refresh {
            portfolio_id,
            from,
            to,
        } => {
            let mut conn = ctx.connect()?;
            let (start, end) = portfolio_range(ctx, &conn, portfolio_id, from, to)?;
            info!("Refreshing snapshots of portfolio {} from {} to {}", portfolio_id, start, end);

            let written = materialize_snapshots(&mut conn, portfolio_id, start, end)?;

            if ctx.json {
                let payload = serde_json::json!({
                    "portfolio_id": portfolio_id,
                    "from": start,
                    "to": end,
                    "snapshots": written,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} Stored {} snapshots for portfolio {} ({} to {})",
                    "✓".green().bold(),
                    written,
                    portfolio_id,
                    start,
                    end
                );
            }
            Ok(())
        }
    }
}
