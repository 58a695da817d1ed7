//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API.

use chrono::{Months, NaiveDate, Utc};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

/// Calendar date used for every expiration comparison.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Expiration date of a card issued on `issued_on`.
pub(crate) fn expiration_after(issued_on: NaiveDate, validity_years: u32) -> ResultEngine<NaiveDate> {
    issued_on
        .checked_add_months(Months::new(validity_years.saturating_mul(12)))
        .ok_or_else(|| EngineError::Validation("card validity period out of range".to_string()))
}

pub(crate) fn normalize_required_id(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_adds_whole_years() {
        let issued = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(
            expiration_after(issued, 3).unwrap(),
            NaiveDate::from_ymd_opt(2029, 10, 17).unwrap()
        );
    }

    #[test]
    fn expiration_clamps_leap_day() {
        let issued = NaiveDate::from_ymd_opt(2028, 2, 29).unwrap();
        assert_eq!(
            expiration_after(issued, 1).unwrap(),
            NaiveDate::from_ymd_opt(2029, 2, 28).unwrap()
        );
    }

    #[test]
    fn parse_uuid_labels_errors() {
        assert_eq!(
            parse_uuid("nope", "card"),
            Err(EngineError::InvalidId("invalid card id".to_string()))
        );
    }

    #[test]
    fn required_ids_are_trimmed() {
        assert_eq!(normalize_required_id("  alice ", "owner").unwrap(), "alice");
        assert!(normalize_required_id("   ", "owner").is_err());
    }
}
