//! fundledger - fund portfolio ledger and valuation engine
//!
//! Records fund transactions, prices and dividends per portfolio in SQLite
//! and values portfolios at any date using average-cost accounting, with a
//! cached daily history.

pub mod cli;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod pricing;
pub mod reports;
pub mod utils;
