// Reports module - valuation summaries, history and the overview read side

pub mod history;
pub mod overview;
pub mod summary;

pub use history::{history, materialize_snapshots, HistoryPoint, PointSource, PortfolioHistory};
pub use summary::{
    compute_portfolio_totals, summarize_fund, summarize_portfolio, FundSummary, PortfolioSummary,
    ValuationTotals,
};
