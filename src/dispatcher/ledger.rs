// Recording commands: funds, transactions, prices and dividends

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::{DividendCommands, FundCommands, PriceCommands, TradeArgs, TxCommands};
use crate::db::{self, Dividend, Fund, FundPrice, Transaction, TransactionType};
use crate::error::ValuationError;
use crate::utils::{format_currency, format_shares};

pub fn dispatch_fund(ctx: &Context, action: FundCommands) -> Result<()> {
    match action {
        FundCommands::Create {
            name,
            isin,
            symbol,
            currency,
        } => {
            let conn = ctx.connect()?;
            let fund = Fund {
                id: None,
                name,
                symbol,
                isin: isin.trim().to_uppercase(),
                currency: currency.trim().to_uppercase(),
            };
            let id = db::create_fund(&conn, &fund)?;

            if ctx.json {
                let payload = serde_json::json!({ "id": id, "isin": fund.isin, "name": fund.name });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("\n{} Fund added successfully!", "✓".green().bold());
                println!("  ID:   {}", id);
                println!("  ISIN: {}", fund.isin.cyan().bold());
                println!("  Name: {}", fund.name);
                println!();
            }
            Ok(())
        }
        FundCommands::Link {
            portfolio_id,
            fund_id,
        } => {
            let conn = ctx.connect()?;
            let id = db::link_fund(&conn, portfolio_id, fund_id)?;

            if ctx.json {
                let payload = serde_json::json!({
                    "portfolio_fund_id": id,
                    "portfolio_id": portfolio_id,
                    "fund_id": fund_id,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} Linked fund {} to portfolio {} (portfolio fund {})",
                    "✓".green().bold(),
                    fund_id,
                    portfolio_id,
                    id
                );
            }
            Ok(())
        }
    }
}

pub fn dispatch_tx(ctx: &Context, action: TxCommands) -> Result<()> {
    match action {
        TxCommands::Buy(args) => record_purchase(ctx, TransactionType::Buy, args),
        TxCommands::Reinvest(args) => record_purchase(ctx, TransactionType::DividendReinvestment, args),
        TxCommands::Sell(args) => record_sell(ctx, args),
        TxCommands::Delete { transaction_id } => {
            let mut conn = ctx.connect()?;
            db::delete_transaction(&mut conn, transaction_id)?;
            if ctx.json {
                let payload = serde_json::json!({ "id": transaction_id, "deleted": true });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{} Removed transaction {}", "✓".green().bold(), transaction_id);
            }
            Ok(())
        }
    }
}

fn record_purchase(ctx: &Context, transaction_type: TransactionType, args: TradeArgs) -> Result<()> {
    let conn = ctx.connect()?;
    let tx = Transaction {
        id: None,
        portfolio_fund_id: args.portfolio_fund_id,
        transaction_type,
        trade_date: args.date,
        shares: args.shares,
        cost_per_share: args.price,
    };
    let id = db::insert_transaction(&conn, &tx)?;

    if ctx.json {
        let payload = serde_json::json!({
            "id": id,
            "type": transaction_type.as_str(),
            "trade_date": tx.trade_date,
            "shares": tx.shares,
            "cost_per_share": tx.cost_per_share,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("\n{} Transaction added successfully!", "✓".green().bold());
    println!("  ID:     {}", id);
    println!("  Type:   {}", transaction_type.as_str());
    println!("  Date:   {}", tx.trade_date);
    println!("  Shares: {}", format_shares(tx.shares));
    println!("  Amount: {}", format_currency(tx.amount(), ctx.symbol()));
    println!();
    Ok(())
}

fn record_sell(ctx: &Context, args: TradeArgs) -> Result<()> {
    let mut conn = ctx.connect()?;
    let (id, realized) = db::record_sell(&mut conn, args.portfolio_fund_id, args.date, args.shares, args.price)?;

    if ctx.json {
        let payload = serde_json::json!({
            "id": id,
            "type": TransactionType::Sell.as_str(),
            "trade_date": realized.transaction_date,
            "shares": realized.shares_sold,
            "cost_basis": realized.cost_basis,
            "sale_proceeds": realized.sale_proceeds,
            "realized_gain_loss": realized.gain_loss(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let gain = realized.gain_loss();
    let gain_text = format_currency(gain, ctx.symbol());
    println!("\n{} Sell recorded!", "✓".green().bold());
    println!("  ID:         {}", id);
    println!("  Shares:     {}", format_shares(realized.shares_sold));
    println!("  Proceeds:   {}", format_currency(realized.sale_proceeds, ctx.symbol()));
    println!("  Cost basis: {}", format_currency(realized.cost_basis, ctx.symbol()));
    if gain.is_sign_negative() {
        println!("  Realized:   {}", gain_text.red());
    } else {
        println!("  Realized:   {}", gain_text.green());
    }
    println!();
    Ok(())
}

pub fn dispatch_price(ctx: &Context, action: PriceCommands) -> Result<()> {
    match action {
        PriceCommands::Set {
            fund_id,
            date,
            price,
        } => {
            let conn = ctx.connect()?;
            db::upsert_fund_price(
                &conn,
                &FundPrice {
                    id: None,
                    fund_id,
                    price_date: date,
                    price,
                },
            )?;

            if ctx.json {
                let payload = serde_json::json!({ "fund_id": fund_id, "date": date, "price": price });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} Price of fund {} on {} set to {}",
                    "✓".green().bold(),
                    fund_id,
                    date,
                    format_currency(price, ctx.symbol())
                );
            }
            Ok(())
        }
    }
}

pub fn dispatch_dividend(ctx: &Context, action: DividendCommands) -> Result<()> {
    match action {
        DividendCommands::Add {
            portfolio_fund_id,
            record_date,
            ex_date,
            shares_owned,
            per_share,
            reinvestment_tx,
        } => {
            let conn = ctx.connect()?;
            let pf = db::get_portfolio_fund(&conn, portfolio_fund_id)?.ok_or(ValuationError::NotFound {
                entity: "portfolio fund",
                id: portfolio_fund_id,
            })?;

            let dividend = Dividend {
                id: None,
                fund_id: pf.fund_id,
                portfolio_fund_id,
                record_date,
                ex_dividend_date: ex_date,
                shares_owned,
                dividend_per_share: per_share,
                reinvestment_transaction_id: reinvestment_tx,
            };
            let id = db::insert_dividend(&conn, &dividend)?;

            if ctx.json {
                let payload = serde_json::json!({
                    "id": id,
                    "record_date": record_date,
                    "total_amount": dividend.total_amount(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} Dividend of {} recorded for portfolio fund {}",
                    "✓".green().bold(),
                    format_currency(dividend.total_amount(), ctx.symbol()),
                    portfolio_fund_id
                );
            }
            Ok(())
        }
    }
}
