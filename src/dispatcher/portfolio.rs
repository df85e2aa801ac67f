use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::{formatters, PortfolioCommands};
use crate::db;

pub fn dispatch_portfolio(ctx: &Context, action: PortfolioCommands) -> Result<()> {
    match action {
        PortfolioCommands::Create {
            name,
            description,
            exclude_from_overview,
        } => create_portfolio(ctx, &name, description.as_deref(), exclude_from_overview),
        PortfolioCommands::List => list_portfolios(ctx),
        PortfolioCommands::Archive { portfolio_id, undo } => archive_portfolio(ctx, portfolio_id, !undo),
        PortfolioCommands::Delete { portfolio_id } => delete_portfolio(ctx, portfolio_id),
    }
}

fn create_portfolio(ctx: &Context, name: &str, description: Option<&str>, exclude: bool) -> Result<()> {
    let conn = ctx.connect()?;
    let id = db::create_portfolio(&conn, name, description, exclude)?;

    if ctx.json {
        let payload = serde_json::json!({
            "id": id,
            "name": name.trim(),
            "description": description,
            "exclude_from_overview": exclude,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("\n{} Portfolio created!", "✓".green().bold());
    println!("  ID:   {}", id);
    println!("  Name: {}", name.trim().cyan().bold());
    if exclude {
        println!("  {}", "Excluded from overview".dimmed());
    }
    println!();
    Ok(())
}

fn list_portfolios(ctx: &Context) -> Result<()> {
    let conn = ctx.connect()?;
    let portfolios = db::list_portfolios(&conn)?;

    if ctx.json {
        println!("{}", formatters::to_json(&portfolios));
        return Ok(());
    }

    if portfolios.is_empty() {
        print!("{}", formatters::format_empty("portfolios"));
        return Ok(());
    }

    println!("{}", formatters::format_portfolio_list(&portfolios));
    Ok(())
}

fn archive_portfolio(ctx: &Context, portfolio_id: i64, archived: bool) -> Result<()> {
    let conn = ctx.connect()?;
    db::set_portfolio_archived(&conn, portfolio_id, archived)?;

    if ctx.json {
        let payload = serde_json::json!({ "id": portfolio_id, "is_archived": archived });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if archived {
        println!("{} Archived portfolio {}", "✓".green().bold(), portfolio_id);
    } else {
        println!("{} Restored portfolio {}", "✓".green().bold(), portfolio_id);
    }
    Ok(())
}

fn delete_portfolio(ctx: &Context, portfolio_id: i64) -> Result<()> {
    let conn = ctx.connect()?;
    db::delete_portfolio(&conn, portfolio_id)?;

    if ctx.json {
        let payload = serde_json::json!({ "id": portfolio_id, "deleted": true });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{} Removed portfolio {}", "✓".green().bold(), portfolio_id);
    }
    Ok(())
}
