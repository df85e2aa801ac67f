//! Utility functions for formatting and parsing
//!
//! Centralized money formatting for table output and the flexible date
//! parsing shared by the CLI arguments.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValuationError;

/// Core formatting function with full control over output.
///
/// Formats a Decimal value with two decimals and `,` thousands separators,
/// prefixed by `symbol` (may be empty).
///
/// # Examples
/// ```
/// use fundledger::utils::format_currency_with_width;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency_with_width(dec!(1234.56), 0, "$"), "$1,234.56");
/// assert_eq!(format_currency_with_width(dec!(1234), 12, ""), "    1,234.00");
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: &str) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let is_negative = rounded < Decimal::ZERO;

    let formatted = format!("{:.2}", rounded.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    // Add thousands separators to integer part
    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let result = format!("{}{}{}.{}", sign, symbol, with_separators, decimal_part);

    // Apply width padding (right-align)
    if width > 0 && result.chars().count() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format with a currency symbol: "$1,234.56"
pub fn format_currency(value: Decimal, symbol: &str) -> String {
    format_currency_with_width(value, 0, symbol)
}

/// Format number only: "1,234.56"
pub fn format_decimal(value: Decimal) -> String {
    format_currency_with_width(value, 0, "")
}

/// Format a share count without trailing zeros
pub fn format_shares(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Parse a date given as YYYY-MM-DD, YYYY-MM or YYYY.
///
/// A month resolves to its last day, a year to December 31.
pub fn parse_flexible_date(s: &str) -> Result<NaiveDate, ValuationError> {
    let s = s.trim();

    // YYYY-MM-DD (exact date)
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    // YYYY-MM (last day of month)
    if let Ok(ym) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        let next_month = if ym.month() == 12 {
            NaiveDate::from_ymd_opt(ym.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(ym.year(), ym.month() + 1, 1)
        };
        if let Some(last_day) = next_month.and_then(|nm| nm.pred_opt()) {
            return Ok(last_day);
        }
    }

    // YYYY (December 31)
    if let Ok(year) = s.parse::<i32>() {
        if (1900..=2100).contains(&year) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, 12, 31) {
                return Ok(date);
            }
        }
    }

    Err(ValuationError::Validation(format!(
        "invalid date '{}', use YYYY-MM-DD, YYYY-MM or YYYY",
        s
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_currency_basic() {
        assert_eq!(format_currency(dec!(1234.56), "$"), "$1,234.56");
        assert_eq!(format_currency(dec!(0.99), "$"), "$0.99");
        assert_eq!(format_currency(dec!(1000000), "€"), "€1,000,000.00");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(dec!(-1234.56), "$"), "-$1,234.56");
        assert_eq!(format_currency(dec!(-0.01), "$"), "-$0.01");
    }

    #[test]
    fn test_format_currency_rounds_half_away_from_zero() {
        assert_eq!(format_decimal(dec!(1.234)), "1.23");
        assert_eq!(format_decimal(dec!(1.235)), "1.24");
        assert_eq!(format_decimal(dec!(-0.004)), "0.00");
    }

    #[test]
    fn test_format_with_width() {
        let result = format_currency_with_width(dec!(100), 12, "$");
        assert_eq!(result, "     $100.00");

        // Already wider than requested
        assert_eq!(format_currency_with_width(dec!(1000000), 5, "$"), "$1,000,000.00");
    }

    #[test]
    fn test_format_shares_drops_trailing_zeros() {
        assert_eq!(format_shares(dec!(10.500)), "10.5");
        assert_eq!(format_shares(dec!(100)), "100");
    }

    #[test]
    fn test_parse_flexible_date() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();

        assert_eq!(parse_flexible_date("2024-03-15").unwrap(), d(2024, 3, 15));
        assert_eq!(parse_flexible_date("2024-02").unwrap(), d(2024, 2, 29));
        assert_eq!(parse_flexible_date("2023-12").unwrap(), d(2023, 12, 31));
        assert_eq!(parse_flexible_date("2024").unwrap(), d(2024, 12, 31));
        assert!(parse_flexible_date("yesterday").is_err());
        assert!(parse_flexible_date("2024-13").is_err());
    }
}
