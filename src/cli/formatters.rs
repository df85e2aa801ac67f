//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of valuation from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::db::Portfolio;
use crate::reports::overview::HistoryDay;
use crate::reports::{FundSummary, HistoryPoint, PortfolioSummary, ValuationTotals};
use crate::utils::{format_currency, format_shares};

/// Serialize any report for `--json` output
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn signed(value: Decimal, symbol: &str) -> String {
    let text = format_currency(value, symbol);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

pub fn format_portfolio_list(portfolios: &[Portfolio]) -> String {
    #[derive(Tabled)]
    struct PortfolioRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Overview")]
        overview: String,
    }

    let rows: Vec<PortfolioRow> = portfolios
        .iter()
        .map(|p| PortfolioRow {
            id: p.id,
            name: p.name.clone(),
            description: p.description.clone().unwrap_or_default(),
            overview: if p.is_archived {
                "archived".to_string()
            } else if p.exclude_from_overview {
                "excluded".to_string()
            } else {
                "yes".to_string()
            },
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

/// Portfolio summaries with a grand total line
pub fn format_summaries_table(summaries: &[PortfolioSummary], symbol: &str) -> String {
    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Portfolio")]
        name: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Unrealized")]
        unrealized: String,
        #[tabled(rename = "Realized")]
        realized: String,
        #[tabled(rename = "Dividends")]
        dividends: String,
        #[tabled(rename = "Total P&L")]
        total: String,
    }

    let rows: Vec<SummaryRow> = summaries
        .iter()
        .map(|s| SummaryRow {
            id: s.portfolio_id,
            name: s.name.clone(),
            cost: format_currency(s.totals.total_cost, symbol),
            value: format_currency(s.totals.total_value, symbol),
            unrealized: signed(s.totals.unrealized_gain_loss, symbol),
            realized: signed(s.totals.realized_gain_loss, symbol),
            dividends: format_currency(s.totals.total_dividends, symbol),
            total: signed(s.totals.total_gain_loss, symbol),
        })
        .collect();

    let mut output = String::new();
    if let Some(first) = summaries.first() {
        output.push_str(&format!(
            "\n{} Portfolio summary as of {}\n\n",
            "📊".cyan().bold(),
            first.as_of
        ));
    }

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());
    output.push_str(&table.to_string());

    if summaries.len() > 1 {
        let total: ValuationTotals = summaries.iter().map(|s| s.totals).sum();
        output.push_str(&format_totals_block(&total, symbol));
    }
    output.push('\n');
    output
}

/// Summary block for a set of totals
pub fn format_totals_block(totals: &ValuationTotals, symbol: &str) -> String {
    let mut output = format!("\n\n{} Totals", "━".repeat(60).bright_black());
    output.push_str(&format!(
        "\n{:<22} {}",
        "Total Cost:".bold(),
        format_currency(totals.total_cost, symbol)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Total Value:".bold(),
        format_currency(totals.total_value, symbol)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Unrealized:".bold(),
        signed(totals.unrealized_gain_loss, symbol)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Realized:".bold(),
        signed(totals.realized_gain_loss, symbol)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Dividends:".bold(),
        format_currency(totals.total_dividends, symbol)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Total P&L:".bold(),
        signed(totals.total_gain_loss, symbol)
    ));
    output
}

pub fn format_breakdown_table(summary: &PortfolioSummary, funds: &[FundSummary], symbol: &str) -> String {
    #[derive(Tabled)]
    struct FundRow {
        #[tabled(rename = "PF")]
        portfolio_fund_id: i64,
        #[tabled(rename = "Fund")]
        name: String,
        #[tabled(rename = "ISIN")]
        isin: String,
        #[tabled(rename = "Shares")]
        shares: String,
        #[tabled(rename = "Avg Cost")]
        avg_cost: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Unrealized")]
        unrealized: String,
        #[tabled(rename = "Realized")]
        realized: String,
        #[tabled(rename = "Dividends")]
        dividends: String,
    }

    let rows: Vec<FundRow> = funds
        .iter()
        .map(|f| FundRow {
            portfolio_fund_id: f.portfolio_fund_id,
            name: match &f.symbol {
                Some(symbol) => format!("{} ({})", f.fund_name, symbol),
                None => f.fund_name.clone(),
            },
            isin: f.isin.clone(),
            shares: format_shares(f.totals.total_shares),
            avg_cost: format_currency(f.average_cost, symbol),
            price: f
                .latest_price
                .map(|p| format_currency(p, symbol))
                .unwrap_or_else(|| "N/A".to_string()),
            value: format_currency(f.totals.total_value, symbol),
            unrealized: signed(f.totals.unrealized_gain_loss, symbol),
            realized: signed(f.totals.realized_gain_loss, symbol),
            dividends: format_currency(f.totals.total_dividends, symbol),
        })
        .collect();

    let mut output = format!(
        "\n{} {} as of {}\n\n",
        "📊".cyan().bold(),
        summary.name,
        summary.as_of
    );

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..), Alignment::right());
    output.push_str(&table.to_string());
    output.push_str(&format_totals_block(&summary.totals, symbol));
    output.push('\n');
    output
}

/// History of a single portfolio, one row per day
pub fn format_history_table(points: &[HistoryPoint], symbol: &str) -> String {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Realized")]
        realized: String,
        #[tabled(rename = "Total P&L")]
        total: String,
    }

    let rows: Vec<HistoryRow> = points
        .iter()
        .map(|p| HistoryRow {
            date: p.date.to_string(),
            cost: format_currency(p.totals.total_cost, symbol),
            value: format_currency(p.totals.total_value, symbol),
            realized: signed(p.totals.realized_gain_loss, symbol),
            total: signed(p.totals.total_gain_loss, symbol),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

/// Overview history, one row per day with the summed portfolios
pub fn format_overview_history_table(days: &[HistoryDay], symbol: &str) -> String {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Portfolios")]
        portfolios: usize,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Total P&L")]
        total: String,
    }

    let rows: Vec<DayRow> = days
        .iter()
        .map(|day| {
            let totals: ValuationTotals = day.portfolios.iter().map(|p| p.totals).sum();
            DayRow {
                date: day.date.to_string(),
                portfolios: day.portfolios.len(),
                cost: format_currency(totals.total_cost, symbol),
                value: format_currency(totals.total_value, symbol),
                total: signed(totals.total_gain_loss, symbol),
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

/// Message shown when there is nothing to report
pub fn format_empty(what: &str) -> String {
    format!(
        "{} No {} found\nCreate one first using: {} portfolio create <name>\n",
        "ℹ".blue().bold(),
        what,
        "fundledger".bold()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn summary(id: i64, value: Decimal) -> PortfolioSummary {
        PortfolioSummary {
            portfolio_id: id,
            name: format!("P{}", id),
            description: None,
            as_of: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            totals: ValuationTotals {
                total_cost: dec!(1000),
                total_value: value,
                unrealized_gain_loss: value - dec!(1000),
                total_gain_loss: value - dec!(1000),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_empty_message() {
        colored::control::set_override(false);
        let msg = format_empty("portfolios");
        assert!(msg.contains("No portfolios found"));
        assert!(msg.contains("portfolio create"));
    }

    #[test]
    fn test_summaries_table_lists_portfolios_and_total() {
        colored::control::set_override(false);
        let table = format_summaries_table(&[summary(1, dec!(1200)), summary(2, dec!(900))], "$");

        assert!(table.contains("P1"));
        assert!(table.contains("P2"));
        assert!(table.contains("$1,200.00"));
        assert!(table.contains("-$100.00"));
        // Grand total block
        assert!(table.contains("$2,100.00"));
    }

    #[test]
    fn test_summary_json_is_flat() {
        let json = to_json(&summary(1, dec!(1200)));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["portfolio_id"], 1);
        assert_eq!(value["as_of"], "2024-06-30");
        assert!(value.get("total_value").is_some());
        assert!(value.get("totals").is_none());
    }
}
