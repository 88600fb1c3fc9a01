//! # Error Types
//!
//! Errors raised by the pure tax logic.
//!
//! ```text
//! ValidationError ──► CoreError ──► ClientError (taxcloud-client) ──► log line
//! ```
//!
//! A destination that fails validation is not an error the checkout sees:
//! the orchestrator logs the [`ValidationError`] and prices the cart at zero.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CoreError {
    /// `capture_trigger` names no known lifecycle event.
    #[error("Unknown capture trigger '{0}' (expected order_creation, payment or shipment)")]
    UnknownCaptureTrigger(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A destination or configuration field the service cannot work with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is missing")]
    Required { field: String },

    /// E.g. a ZIP with too few digits, or a TIC that is not five digits.
    #[error("{field} is malformed: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} is outside {min}..={max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Only some values are supported (the destination country must be US).
    #[error("{field} is not supported, expected one of {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_messages() {
        let missing = ValidationError::Required { field: "city".into() };
        assert_eq!(missing.to_string(), "city is missing");

        let country = ValidationError::NotAllowed {
            field: "country".into(),
            allowed: vec!["US".into()],
        };
        assert_eq!(country.to_string(), "country is not supported, expected one of [\"US\"]");

        let rate = ValidationError::OutOfRange {
            field: "default_rate_bps".into(),
            min: 0,
            max: 10_000,
        };
        assert_eq!(rate.to_string(), "default_rate_bps is outside 0..=10000");
    }

    #[test]
    fn test_validation_is_transparent_in_core_error() {
        let err: CoreError = ValidationError::Required { field: "postcode".into() }.into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(err.to_string(), "postcode is missing");
    }

    #[test]
    fn test_unknown_trigger_message() {
        let err = CoreError::UnknownCaptureTrigger("invoice".into());
        assert!(err.to_string().contains("'invoice'"));
        assert!(err.to_string().contains("order_creation"));
    }
}
