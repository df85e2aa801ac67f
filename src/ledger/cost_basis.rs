use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::db::Transaction;
use crate::error::ValuationError;

/// Average-cost position tracker for one portfolio fund
///
/// State is two running numbers. Buys and reinvestments add shares and
/// cost; a sell removes the same fraction of cost as of shares, so the
/// average cost per share is unchanged by partial sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostBasisTracker {
    total_shares: Decimal,
    total_cost: Decimal,
}

impl CostBasisTracker {
    pub fn new() -> Self {
        Self {
            total_shares: Decimal::ZERO,
            total_cost: Decimal::ZERO,
        }
    }

    /// Replay an ordered ledger, skipping entries after `as_of` (inclusive cutoff)
    pub fn replay(transactions: &[Transaction], as_of: Option<NaiveDate>) -> Result<Self> {
        let mut tracker = Self::new();
        for tx in transactions {
            if as_of.is_some_and(|cutoff| tx.trade_date > cutoff) {
                continue;
            }
            tracker.apply(tx)?;
        }
        Ok(tracker)
    }

    /// Apply a single ledger entry
    pub fn apply(&mut self, tx: &Transaction) -> Result<()> {
        if tx.shares <= Decimal::ZERO {
            return Err(ValuationError::DataIntegrity(format!(
                "transaction {:?} on {} has non-positive share count {}",
                tx.id, tx.trade_date, tx.shares
            ))
            .into());
        }

        if tx.transaction_type.adds_shares() {
            self.add_shares(tx.shares, tx.amount());
        } else {
            self.apply_sell(tx.shares, tx.trade_date)?;
        }
        Ok(())
    }

    pub fn add_shares(&mut self, shares: Decimal, cost: Decimal) {
        self.total_shares += shares;
        self.total_cost += cost;
    }

    /// Remove `shares` from the position, returns the cost basis removed
    pub fn apply_sell(&mut self, shares: Decimal, trade_date: NaiveDate) -> Result<Decimal> {
        if self.total_shares <= Decimal::ZERO {
            return Err(ValuationError::DataIntegrity(format!(
                "sell of {} shares on {} with no shares held (cost basis {})",
                shares, trade_date, self.total_cost
            ))
            .into());
        }

        if shares > self.total_shares {
            return Err(ValuationError::DataIntegrity(format!(
                "sell of {} shares on {} exceeds the {} shares held",
                shares, trade_date, self.total_shares
            ))
            .into());
        }

        let removed = if shares == self.total_shares {
            self.total_cost
        } else {
            // cost × (sold / held), multiplied first to keep exact decimals
            self.total_cost * shares / self.total_shares
        };

        self.total_shares -= shares;
        self.total_cost -= removed;

        Ok(removed)
    }

    pub fn total_shares(&self) -> Decimal {
        self.total_shares
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn average_cost(&self) -> Decimal {
        if self.total_shares > Decimal::ZERO {
            self.total_cost / self.total_shares
        } else {
            Decimal::ZERO
        }
    }
}

impl Default for CostBasisTracker {
    fn default() -> Self {
        Self::new()
    }
}
