use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::db::{
    self, Dividend, Fund, FundPrice, Portfolio, PortfolioFund, RealizedGainLoss, Transaction,
};
use crate::error::ValuationError;
use crate::ledger::{self, CostBasisTracker, RealizedTotals};
use crate::pricing::{self, PriceTable};

/// Valuation figures for a fund or a whole portfolio at one date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationTotals {
    pub total_shares: Decimal,
    pub total_cost: Decimal,
    pub total_value: Decimal,
    pub unrealized_gain_loss: Decimal,
    pub realized_gain_loss: Decimal,
    pub total_gain_loss: Decimal,
    pub total_dividends: Decimal,
    pub sale_proceeds: Decimal,
    pub original_cost_of_sold: Decimal,
}

impl ValuationTotals {
    /// Combine a replayed position with its price, realized and dividend figures.
    /// A missing price values the position at zero.
    pub fn assemble(
        position: &CostBasisTracker,
        price: Option<Decimal>,
        realized: RealizedTotals,
        total_dividends: Decimal,
    ) -> Self {
        let total_value = price
            .map(|p| position.total_shares() * p)
            .unwrap_or(Decimal::ZERO);
        let unrealized_gain_loss = total_value - position.total_cost();

        ValuationTotals {
            total_shares: position.total_shares(),
            total_cost: position.total_cost(),
            total_value,
            unrealized_gain_loss,
            realized_gain_loss: realized.realized_gain_loss,
            total_gain_loss: unrealized_gain_loss + realized.realized_gain_loss,
            total_dividends,
            sale_proceeds: realized.sale_proceeds,
            original_cost_of_sold: realized.original_cost_of_sold,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == ValuationTotals::default()
    }
}

impl AddAssign for ValuationTotals {
    fn add_assign(&mut self, other: Self) {
        self.total_shares += other.total_shares;
        self.total_cost += other.total_cost;
        self.total_value += other.total_value;
        self.unrealized_gain_loss += other.unrealized_gain_loss;
        self.realized_gain_loss += other.realized_gain_loss;
        self.total_gain_loss += other.total_gain_loss;
        self.total_dividends += other.total_dividends;
        self.sale_proceeds += other.sale_proceeds;
        self.original_cost_of_sold += other.original_cost_of_sold;
    }
}

impl Add for ValuationTotals {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Sum for ValuationTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ValuationTotals::default(), Add::add)
    }
}

/// Summary of one fund held in a portfolio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundSummary {
    pub portfolio_fund_id: i64,
    pub fund_id: i64,
    pub fund_name: String,
    pub symbol: Option<String>,
    pub isin: String,
    pub currency: String,
    pub as_of: NaiveDate,
    pub latest_price: Option<Decimal>,
    pub average_cost: Decimal,
    #[serde(flatten)]
    pub totals: ValuationTotals,
}

/// Summary of a portfolio: the field-wise sum of its funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub portfolio_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub as_of: NaiveDate,
    #[serde(flatten)]
    pub totals: ValuationTotals,
}

/// Everything stored about one portfolio fund, loaded once
#[derive(Debug, Clone)]
pub struct FundLedger {
    pub portfolio_fund: PortfolioFund,
    pub fund: Fund,
    transactions: Vec<Transaction>,
    dividends: Vec<Dividend>,
    realized: Vec<RealizedGainLoss>,
    prices: PriceTable,
}

impl FundLedger {
    pub fn load(conn: &Connection, portfolio_fund: PortfolioFund, fund: Fund) -> Result<Self> {
        Ok(FundLedger {
            transactions: ledger::load_transactions(conn, portfolio_fund.id)?,
            dividends: ledger::load_dividends(conn, portfolio_fund.id)?,
            realized: ledger::load_realized(
                conn,
                portfolio_fund.portfolio_id,
                Some(portfolio_fund.fund_id),
            )?,
            prices: PriceTable::load(conn, portfolio_fund.fund_id)?,
            portfolio_fund,
            fund,
        })
    }

    /// Build from already-loaded records (used by tests and batch callers)
    pub fn from_parts(
        portfolio_fund: PortfolioFund,
        fund: Fund,
        transactions: Vec<Transaction>,
        dividends: Vec<Dividend>,
        realized: Vec<RealizedGainLoss>,
        prices: PriceTable,
    ) -> Self {
        FundLedger {
            portfolio_fund,
            fund,
            transactions,
            dividends,
            realized,
            prices,
        }
    }

    /// Fund summary as of a date (inclusive)
    pub fn summary_as_of(&self, as_of: NaiveDate) -> Result<FundSummary> {
        let position = CostBasisTracker::replay(&self.transactions, Some(as_of)).with_context(|| {
            format!(
                "failed to replay ledger of portfolio fund {} ({})",
                self.portfolio_fund.id, self.fund.isin
            )
        })?;
        let latest_price = self.prices.price_on_or_before(as_of);
        let realized = RealizedTotals::from_rows(&self.realized, as_of);
        let dividends = ledger::total_dividends(&self.dividends, as_of);

        Ok(FundSummary {
            portfolio_fund_id: self.portfolio_fund.id,
            fund_id: self.portfolio_fund.fund_id,
            fund_name: self.fund.name.clone(),
            symbol: self.fund.symbol.clone(),
            isin: self.fund.isin.clone(),
            currency: self.fund.currency.clone(),
            as_of,
            latest_price,
            average_cost: position.average_cost(),
            totals: ValuationTotals::assemble(&position, latest_price, realized, dividends),
        })
    }
}

/// All fund ledgers of a portfolio
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    pub portfolio: Portfolio,
    funds: Vec<FundLedger>,
}

impl PortfolioLedger {
    pub fn load(conn: &Connection, portfolio: Portfolio) -> Result<Self> {
        let funds = db::list_portfolio_funds(conn, portfolio.id)?
            .into_iter()
            .map(|(pf, fund)| FundLedger::load(conn, pf, fund))
            .collect::<Result<Vec<_>>>()?;

        Ok(PortfolioLedger { portfolio, funds })
    }

    pub fn from_funds(portfolio: Portfolio, funds: Vec<FundLedger>) -> Self {
        PortfolioLedger { portfolio, funds }
    }

    pub fn fund_summaries_as_of(&self, as_of: NaiveDate) -> Result<Vec<FundSummary>> {
        self.funds.iter().map(|f| f.summary_as_of(as_of)).collect()
    }

    /// The canonical portfolio valuation. Both the snapshot writer and the
    /// cache-miss fallback go through here.
    pub fn totals_as_of(&self, as_of: NaiveDate) -> Result<ValuationTotals> {
        Ok(self
            .fund_summaries_as_of(as_of)?
            .into_iter()
            .map(|s| s.totals)
            .sum())
    }

    pub fn summary_as_of(&self, as_of: NaiveDate) -> Result<PortfolioSummary> {
        Ok(PortfolioSummary {
            portfolio_id: self.portfolio.id,
            name: self.portfolio.name.clone(),
            description: self.portfolio.description.clone(),
            as_of,
            totals: self.totals_as_of(as_of)?,
        })
    }

    /// Earliest trade date across all funds
    pub fn first_trade_date(&self) -> Option<NaiveDate> {
        self.funds
            .iter()
            .filter_map(|f| f.transactions.first().map(|t| t.trade_date))
            .min()
    }
}

/// Summarize one fund of a portfolio as of a date.
///
/// Only one date is valued, so the price comes from a single lookup rather
/// than the fund's whole price series.
pub fn summarize_fund(conn: &Connection, portfolio_fund: PortfolioFund, as_of: NaiveDate) -> Result<FundSummary> {
    let fund = db::get_fund(conn, portfolio_fund.fund_id)?
        .ok_or(ValuationError::fund_not_found(portfolio_fund.fund_id))?;

    let prices = pricing::resolve_price(conn, portfolio_fund.fund_id, as_of)?
        .map(|price| FundPrice {
            id: None,
            fund_id: portfolio_fund.fund_id,
            price_date: as_of,
            price,
        })
        .into_iter()
        .collect();

    FundLedger::from_parts(
        portfolio_fund,
        fund,
        ledger::load_transactions(conn, portfolio_fund.id)?,
        ledger::load_dividends(conn, portfolio_fund.id)?,
        ledger::load_realized(conn, portfolio_fund.portfolio_id, Some(portfolio_fund.fund_id))?,
        PriceTable::from_prices(prices),
    )
    .summary_as_of(as_of)
}

/// Summarize an existing portfolio as of a date
pub fn summarize_portfolio(conn: &Connection, portfolio: Portfolio, as_of: NaiveDate) -> Result<PortfolioSummary> {
    PortfolioLedger::load(conn, portfolio)?.summary_as_of(as_of)
}

/// Totals of a portfolio as of a date; a missing portfolio is NotFound
pub fn compute_portfolio_totals(conn: &Connection, portfolio_id: i64, as_of: NaiveDate) -> Result<ValuationTotals> {
    let portfolio = db::require_portfolio(conn, portfolio_id)?;
    PortfolioLedger::load(conn, portfolio)?.totals_as_of(as_of)
}
