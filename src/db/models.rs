use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Portfolio (a named collection of fund holdings)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Portfolio {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_archived: bool,
    pub exclude_from_overview: bool,
}

impl Portfolio {
    /// Whether the portfolio takes part in the all-portfolios overview and history
    pub fn is_in_overview(&self) -> bool {
        !self.is_archived && !self.exclude_from_overview
    }
}

/// Fund (mutual fund, ETF or stock tracked by ISIN)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fund {
    pub id: Option<i64>,
    pub name: String,
    pub symbol: Option<String>,
    pub isin: String,
    pub currency: String,
}

/// Link between a portfolio and a fund; owns the transaction stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortfolioFund {
    pub id: i64,
    pub portfolio_id: i64,
    pub fund_id: i64,
}

/// Transaction type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Buy,
    Sell,
    DividendReinvestment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
            TransactionType::DividendReinvestment => "DIVIDEND_REINVESTMENT",
        }
    }

    /// Buys and reinvestments both add shares and cost
    pub fn adds_shares(&self) -> bool {
        matches!(
            self,
            TransactionType::Buy | TransactionType::DividendReinvestment
        )
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "B" => Ok(TransactionType::Buy),
            "SELL" | "S" => Ok(TransactionType::Sell),
            "DIVIDEND_REINVESTMENT" | "DIVIDEND-REINVESTMENT" | "DIVIDEND" | "REINVEST"
            | "DRIP" => Ok(TransactionType::DividendReinvestment),
            _ => Err(()),
        }
    }
}

/// Transaction (one ledger entry of a portfolio fund)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub portfolio_fund_id: i64,
    pub transaction_type: TransactionType,
    pub trade_date: NaiveDate,
    pub shares: Decimal,
    pub cost_per_share: Decimal,
}

impl Transaction {
    /// shares × cost_per_share (purchase cost or sale proceeds)
    pub fn amount(&self) -> Decimal {
        self.shares * self.cost_per_share
    }
}

/// Price observation for a fund on a date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FundPrice {
    pub id: Option<i64>,
    pub fund_id: i64,
    pub price_date: NaiveDate,
    pub price: Decimal,
}

/// Dividend paid to a portfolio fund
///
/// `reinvestment_transaction_id` points at the buy created when the cash
/// was reinvested. It is informational only: the reinvested shares are
/// already part of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dividend {
    pub id: Option<i64>,
    pub fund_id: i64,
    pub portfolio_fund_id: i64,
    pub record_date: NaiveDate,
    pub ex_dividend_date: Option<NaiveDate>,
    pub shares_owned: Decimal,
    pub dividend_per_share: Decimal,
    pub reinvestment_transaction_id: Option<i64>,
}

impl Dividend {
    /// Cash amount of the dividend
    pub fn total_amount(&self) -> Decimal {
        self.shares_owned * self.dividend_per_share
    }
}

/// Realized gain/loss recorded together with a sell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealizedGainLoss {
    pub id: Option<i64>,
    pub portfolio_id: i64,
    pub fund_id: i64,
    pub transaction_id: i64,
    pub transaction_date: NaiveDate,
    pub shares_sold: Decimal,
    pub cost_basis: Decimal,
    pub sale_proceeds: Decimal,
}

impl RealizedGainLoss {
    pub fn gain_loss(&self) -> Decimal {
        self.sale_proceeds - self.cost_basis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_type_round_trips_storage_names() {
        for tx_type in [
            TransactionType::Buy,
            TransactionType::Sell,
            TransactionType::DividendReinvestment,
        ] {
            assert_eq!(tx_type.as_str().parse::<TransactionType>(), Ok(tx_type));
        }
    }

    #[test]
    fn test_transaction_type_aliases() {
        assert_eq!("drip".parse::<TransactionType>(), Ok(TransactionType::DividendReinvestment));
        assert_eq!(" sell ".parse::<TransactionType>(), Ok(TransactionType::Sell));
        assert!("transfer".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_adds_shares() {
        assert!(TransactionType::Buy.adds_shares());
        assert!(TransactionType::DividendReinvestment.adds_shares());
        assert!(!TransactionType::Sell.adds_shares());
    }

    #[test]
    fn test_dividend_amount_is_derived() {
        let dividend = Dividend {
            id: None,
            fund_id: 1,
            portfolio_fund_id: 1,
            record_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            ex_dividend_date: None,
            shares_owned: dec!(100),
            dividend_per_share: dec!(0.50),
            reinvestment_transaction_id: None,
        };
        assert_eq!(dividend.total_amount(), dec!(50));
    }

    #[test]
    fn test_realized_gain_loss_sign() {
        let loss = RealizedGainLoss {
            id: None,
            portfolio_id: 1,
            fund_id: 1,
            transaction_id: 1,
            transaction_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            shares_sold: dec!(10),
            cost_basis: dec!(120),
            sale_proceeds: dec!(100),
        };
        assert_eq!(loss.gain_loss(), dec!(-20));
    }

    #[test]
    fn test_portfolio_overview_membership() {
        let mut portfolio = Portfolio {
            id: 1,
            name: "Core".to_string(),
            description: None,
            is_archived: false,
            exclude_from_overview: false,
        };
        assert!(portfolio.is_in_overview());
        portfolio.exclude_from_overview = true;
        assert!(!portfolio.is_in_overview());
        portfolio.exclude_from_overview = false;
        portfolio.is_archived = true;
        assert!(!portfolio.is_in_overview());
    }
}
