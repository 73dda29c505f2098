//! Parsing of raw form input into validated domain values.
//!
//! Everything here runs before any data access call is made; a failure is an
//! [`InputError`] that the presentation layer renders as a negative status line.

use chrono::NaiveDate;
use thiserror::Error;

use crate::ids::IdError;
use crate::types::{Money, MoneyError, OrderStatus, Quantity, UnknownStatus};

/// Date format accepted by every date field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation failure detected at the presentation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Quantity must be a whole number")]
    QuantityNotNumeric,
    #[error("Quantity must be greater than 0")]
    QuantityNotPositive,
    #[error("{field} must be a valid date in YYYY-MM-DD format (got '{value}')")]
    InvalidDate { field: &'static str, value: String },
    #[error("{field}: {source}")]
    InvalidAmount {
        field: &'static str,
        source: MoneyError,
    },
    #[error("{0} cannot be negative")]
    NegativeAmount(&'static str),
    #[error(transparent)]
    Status(#[from] UnknownStatus),
    #[error("start date {start} is after end date {end}")]
    InvertedDates { start: NaiveDate, end: NaiveDate },
    #[error("minimum total {min} is greater than maximum total {max}")]
    InvertedAmounts { min: Money, max: Money },
}

/// Returns the trimmed text or [`InputError::Required`] when it is blank.
pub fn required<'a>(field: &'static str, raw: &'a str) -> Result<&'a str, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(InputError::Required(field))
    } else {
        Ok(trimmed)
    }
}

/// Returns `None` for blank optional fields.
pub fn optional(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// Parses a strictly positive whole quantity.
pub fn parse_quantity(raw: &str) -> Result<Quantity, InputError> {
    let text = required("Quantity", raw)?;
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InputError::QuantityNotNumeric);
    }
    if text.starts_with('-') {
        return Err(InputError::QuantityNotPositive);
    }

    let value: u32 = text.parse().map_err(|_| InputError::QuantityNotNumeric)?;
    Quantity::new(value).ok_or(InputError::QuantityNotPositive)
}

/// Parses a calendar date in `YYYY-MM-DD` form, rejecting impossible dates.
pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, InputError> {
    let text = required(field, raw)?;
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| InputError::InvalidDate {
        field,
        value: text.to_string(),
    })
}

/// Parses a non-negative price or total.
pub fn parse_amount(field: &'static str, raw: &str) -> Result<Money, InputError> {
    let text = required(field, raw)?;
    let amount: Money = text
        .parse()
        .map_err(|source| InputError::InvalidAmount { field, source })?;
    if amount < Money::ZERO {
        return Err(InputError::NegativeAmount(field));
    }
    Ok(amount)
}

pub fn parse_status(raw: &str) -> Result<OrderStatus, InputError> {
    let text = required("Order status", raw)?;
    Ok(text.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive_whole_number() {
        assert_eq!(parse_quantity("3").unwrap().get(), 3);
        assert_eq!(parse_quantity(" 12 ").unwrap().get(), 12);
        assert_eq!(parse_quantity("0"), Err(InputError::QuantityNotPositive));
        assert_eq!(parse_quantity("-4"), Err(InputError::QuantityNotPositive));
        assert_eq!(parse_quantity("2.5"), Err(InputError::QuantityNotNumeric));
        assert_eq!(parse_quantity("ten"), Err(InputError::QuantityNotNumeric));
        assert_eq!(parse_quantity(""), Err(InputError::Required("Quantity")));
    }

    #[test]
    fn date_rejects_impossible_calendar_days() {
        assert_eq!(
            parse_date("Order date", "2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(matches!(
            parse_date("Order date", "2023-02-29"),
            Err(InputError::InvalidDate { .. })
        ));
        assert!(matches!(
            parse_date("Order date", "2024/01/01"),
            Err(InputError::InvalidDate { .. })
        ));
    }

    #[test]
    fn amount_rejects_negative_values() {
        assert_eq!(parse_amount("Price", "19.99").unwrap(), Money::from_cents(1999));
        assert_eq!(parse_amount("Price", "-1"), Err(InputError::NegativeAmount("Price")));
        assert!(matches!(
            parse_amount("Price", "1,00"),
            Err(InputError::InvalidAmount { field: "Price", .. })
        ));
    }

    #[test]
    fn optional_treats_blank_as_absent() {
        assert_eq!(optional(Some("  ")), None);
        assert_eq!(optional(Some(" x ")), Some("x"));
        assert_eq!(optional(None), None);
    }
}
