//! # Postal Code Parsing
//!
//! Splits a free-form US postal code into the `Zip5` / `Zip4` pair the tax
//! service expects.
//!
//! ```text
//! "55057-1616"        ─┐
//! "55057+1616"         │   strip non-digits    first 5     digits 6..9
//! "55057 1616"         ├──► "550571616" ──────► "55057" ──► "1616"
//! "55057.1616"         │                                  (only when ≥ 9
//! "55057-1616-extra"  ─┘                                   digits exist)
//! ```
//!
//! Parsing never fails; [`is_valid`] decides whether the result is usable.

use serde::{Deserialize, Serialize};

/// A postal code split into its ZIP and ZIP+4 parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPostalCode {
    pub zip5: Option<String>,
    pub zip4: Option<String>,
}

/// Parses a postal code of any separator style.
///
/// `zip5` holds up to the first five digits (fewer when the input is short).
/// `zip4` is set only when at least nine digits are present; digits past the
/// ninth are ignored.
///
/// ## Example
/// ```rust
/// use taxcloud_core::postal::parse;
///
/// let parsed = parse(Some("1234567890"));
/// assert_eq!(parsed.zip5.as_deref(), Some("12345"));
/// assert_eq!(parsed.zip4.as_deref(), Some("6789"));
///
/// assert_eq!(parse(None), Default::default());
/// ```
pub fn parse(input: Option<&str>) -> ParsedPostalCode {
    let Some(input) = input.filter(|s| !s.is_empty()) else {
        return ParsedPostalCode::default();
    };

    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return ParsedPostalCode::default();
    }

    let zip5 = digits.chars().take(5).collect::<String>();
    let zip4 = if digits.len() >= 9 {
        Some(digits[5..9].to_string())
    } else {
        None
    };

    ParsedPostalCode {
        zip5: Some(zip5),
        zip4,
    }
}

/// Checks that `zip5` is exactly five digits and `zip4`, when present, exactly
/// four.
pub fn is_valid(parsed: &ParsedPostalCode) -> bool {
    let zip5_ok = parsed
        .zip5
        .as_deref()
        .is_some_and(|z| is_digits_of_len(z, 5));
    let zip4_ok = parsed
        .zip4
        .as_deref()
        .map_or(true, |z| is_digits_of_len(z, 4));
    zip5_ok && zip4_ok
}

fn is_digits_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}
