//! Error handling for the valuation engine
//!
//! Defines the typed failures callers need to tell apart (a scope that does
//! not exist, a ledger that cannot be replayed) and establishes a unified
//! Result type using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for ledger and valuation operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValuationError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl ValuationError {
    pub fn portfolio_not_found(id: i64) -> Self {
        ValuationError::NotFound {
            entity: "portfolio",
            id,
        }
    }

    pub fn fund_not_found(id: i64) -> Self {
        ValuationError::NotFound { entity: "fund", id }
    }
}

/// Result type alias for engine operations
pub type Result<T> = anyhow::Result<T>;

/// True when the error chain carries a `ValuationError::NotFound`.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ValuationError>(),
        Some(ValuationError::NotFound { .. })
    )
}

/// True when the error chain carries a `ValuationError::DataIntegrity`.
pub fn is_data_integrity(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ValuationError>(),
        Some(ValuationError::DataIntegrity(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = ValuationError::portfolio_not_found(7);
        assert_eq!(err.to_string(), "portfolio 7 not found");

        let err = ValuationError::DataIntegrity("sell before any buy".to_string());
        assert_eq!(err.to_string(), "data integrity error: sell before any buy");
    }

    #[test]
    fn test_anyhow_context_keeps_typed_error() {
        use anyhow::Context;
        let result: Result<()> = Err(anyhow::Error::new(ValuationError::fund_not_found(3)))
            .context("failed to build breakdown");
        match result {
            Err(e) => {
                assert!(e.to_string().contains("failed to build breakdown"));
                assert!(is_not_found(&e));
                assert!(!is_data_integrity(&e));
            }
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_untyped_errors_are_not_classified() {
        let err = anyhow::anyhow!("disk full");
        assert!(!is_not_found(&err));
        assert!(!is_data_integrity(&err));
    }
}
