//! # Validation Module
//!
//! Checks run before anything is sent to the tax service.
//!
//! ## Destination Preconditions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lookup_taxes only calls out when every check passes, in this order:   │
//! │                                                                         │
//! │   1. shipping address present                                          │
//! │   2. country is US                                                     │
//! │   3. region (state) present                                            │
//! │   4. city present                                                      │
//! │   5. postcode present                                                  │
//! │   6. postcode parses to a valid Zip5 / Zip4                            │
//! │                                                                         │
//! │  The first failure is returned; the caller logs it and answers with    │
//! │  zero tax.                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::postal::{self, ParsedPostalCode};
use crate::types::Address;
use crate::SUPPORTED_COUNTRY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Highest rate the local fallback table accepts (100%).
pub const MAX_RATE_BPS: u32 = 10_000;

// =============================================================================
// Destination
// =============================================================================

/// Validates a shipping destination and returns its parsed postcode.
///
/// ## Example
/// ```rust
/// use taxcloud_core::types::Address;
/// use taxcloud_core::validation::validate_destination;
///
/// let address = Address {
///     street: vec!["1 Main St".into()],
///     city: Some("Northfield".into()),
///     region: Some("MN".into()),
///     postcode: Some("55057".into()),
///     country_id: Some("US".into()),
/// };
/// let parsed = validate_destination(Some(&address)).unwrap();
/// assert_eq!(parsed.zip5.as_deref(), Some("55057"));
///
/// assert!(validate_destination(None).is_err());
/// ```
pub fn validate_destination(address: Option<&Address>) -> ValidationResult<ParsedPostalCode> {
    let address = address.ok_or_else(|| required("address"))?;

    if address.country_id.as_deref() != Some(SUPPORTED_COUNTRY) {
        return Err(ValidationError::NotAllowed {
            field: "country".to_string(),
            allowed: vec![SUPPORTED_COUNTRY.to_string()],
        });
    }

    if is_blank(address.region.as_deref()) {
        return Err(required("region"));
    }

    if is_blank(address.city.as_deref()) {
        return Err(required("city"));
    }

    let postcode = address.postcode.as_deref().filter(|p| !p.trim().is_empty());
    let Some(postcode) = postcode else {
        return Err(required("postcode"));
    };

    let parsed = postal::parse(Some(postcode));
    if !postal::is_valid(&parsed) {
        return Err(ValidationError::InvalidFormat {
            field: "postcode".to_string(),
            reason: format!("{postcode:?} is not a ZIP or ZIP+4 code"),
        });
    }

    Ok(parsed)
}

// =============================================================================
// Configuration Values
// =============================================================================

/// Validates a Taxability Information Code: five ASCII digits.
///
/// ## Example
/// ```rust
/// use taxcloud_core::validation::validate_tic;
///
/// assert!(validate_tic("default_tic", "00000").is_ok());
/// assert!(validate_tic("default_tic", "1101").is_err());
/// ```
pub fn validate_tic(field: &str, tic: &str) -> ValidationResult<()> {
    if tic.trim().is_empty() {
        return Err(required(field));
    }
    if tic.len() != 5 || !tic.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected 5 digits".to_string(),
        });
    }
    Ok(())
}

/// Validates a rate-table entry in basis points.
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > MAX_RATE_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_RATE_BPS as i64,
        });
    }
    Ok(())
}

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            street: vec!["1 Main St".into()],
            city: Some("Northfield".into()),
            region: Some("MN".into()),
            postcode: Some("55057-1616".into()),
            country_id: Some("US".into()),
        }
    }

    #[test]
    fn test_valid_destination() {
        let parsed = validate_destination(Some(&address())).unwrap();
        assert_eq!(parsed.zip4.as_deref(), Some("1616"));
    }

    #[test]
    fn test_missing_address() {
        assert_eq!(
            validate_destination(None).unwrap_err(),
            ValidationError::Required {
                field: "address".into()
            }
        );
    }

    #[test]
    fn test_non_us_country() {
        let mut a = address();
        a.country_id = Some("CA".into());
        assert!(matches!(
            validate_destination(Some(&a)),
            Err(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_checks_run_in_order() {
        let mut a = address();
        a.region = None;
        a.city = Some(" ".into());
        a.postcode = None;
        // Region is reported before city and postcode
        assert_eq!(
            validate_destination(Some(&a)).unwrap_err(),
            ValidationError::Required {
                field: "region".into()
            }
        );

        a.region = Some("MN".into());
        assert_eq!(
            validate_destination(Some(&a)).unwrap_err(),
            ValidationError::Required {
                field: "city".into()
            }
        );

        a.city = Some("Northfield".into());
        assert_eq!(
            validate_destination(Some(&a)).unwrap_err(),
            ValidationError::Required {
                field: "postcode".into()
            }
        );
    }

    #[test]
    fn test_invalid_postcode() {
        let mut a = address();
        a.postcode = Some("5505".into());
        assert!(matches!(
            validate_destination(Some(&a)),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_tic() {
        assert!(validate_tic("shipping_tic", "11010").is_ok());
        assert!(validate_tic("shipping_tic", "").is_err());
        assert!(validate_tic("shipping_tic", "1101a").is_err());
    }

    #[test]
    fn test_validate_rate_bps() {
        assert!(validate_rate_bps("default_rate_bps", 825).is_ok());
        assert!(validate_rate_bps("default_rate_bps", 10_000).is_ok());
        assert!(validate_rate_bps("default_rate_bps", 10_001).is_err());
    }
}
