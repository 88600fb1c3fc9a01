//! # Money Module
//!
//! Integer-cent amounts for prices, discounts and tax.
//!
//! ## Where Floats Are Allowed
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE WIRE BOUNDARY                                                      │
//! │                                                                         │
//! │  The remote tax service speaks JSON numbers:                            │
//! │    { "Price": 10.99, "TaxAmount": 0.825 }                              │
//! │                                                                         │
//! │  Inside the integration every amount is integer cents:                 │
//! │    Money::from_wire_amount(0.825) → 83 cents                           │
//! │    Money::from_cents(1099).to_wire_amount() → 10.99                    │
//! │                                                                         │
//! │  from_wire_amount / to_wire_amount are the ONLY float conversions.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use taxcloud_core::money::Money;
//!
//! let row_total = Money::from_cents(5997);         // 3 x $19.99
//! let row_tax = Money::from_wire_amount(4.12);     // from CartItemResponse
//! assert_eq!((row_total + row_tax).cents(), 6409);
//! assert_eq!(row_tax.divide_by_quantity(3).cents(), 137);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// An amount in cents. Signed, since discounts are subtracted from it.
///
/// Serializes as a bare integer, which keeps cached lookup results exact.
///
/// ## Checkout Context
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                    Where Money is Used                                  │
/// │                                                                         │
/// │  LineItem.unit_price ──► CartItem.Price (wire) ──► remote Lookup       │
/// │                                                                         │
/// │  CartItemResponse.TaxAmount ──► TaxLookupResult ──► LineItem.row_tax   │
/// │                                                                         │
/// │  row_total + row_tax ──► row_total_incl_tax ──► QuoteTotals            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal amount received from the remote service into cents,
    /// rounding half away from zero.
    ///
    /// Non-finite input (NaN, infinity) becomes zero.
    ///
    /// ## Example
    /// ```rust
    /// use taxcloud_core::money::Money;
    ///
    /// assert_eq!(Money::from_wire_amount(0.825).cents(), 83);
    /// assert_eq!(Money::from_wire_amount(10.5).cents(), 1050);
    /// ```
    pub fn from_wire_amount(amount: f64) -> Self {
        if !amount.is_finite() {
            return Money::zero();
        }
        // Nudge by a tiny epsilon so 0.825 (stored as 0.82499999...) rounds up
        let scaled = amount * 100.0;
        let nudged = scaled + scaled.signum() * 1e-7;
        Money(nudged.round() as i64)
    }

    /// Converts cents into the decimal amount the remote service expects.
    #[inline]
    pub fn to_wire_amount(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollars portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Calculates tax at the given rate.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5).
    ///
    /// ## Example
    /// ```rust
    /// use taxcloud_core::money::Money;
    /// use taxcloud_core::types::TaxRate;
    ///
    /// let price = Money::from_cents(1000); // $10.00
    /// let rate = TaxRate::from_bps(825);   // 8.25%
    ///
    /// // $10.00 × 8.25% = $0.825 → rounds to $0.83
    /// assert_eq!(price.calculate_tax(rate).cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so large row totals cannot overflow
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Splits an amount evenly across `qty` units, rounding half away from
    /// zero. A non-positive quantity yields zero.
    ///
    /// Used for the per-unit discount (`discount / qty`) and the per-unit tax
    /// added to `price_incl_tax`.
    ///
    /// ## Example
    /// ```rust
    /// use taxcloud_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(100).divide_by_quantity(3).cents(), 33);
    /// assert_eq!(Money::from_cents(50).divide_by_quantity(4).cents(), 13);
    /// assert_eq!(Money::from_cents(100).divide_by_quantity(0).cents(), 0);
    /// ```
    pub fn divide_by_quantity(&self, qty: i64) -> Money {
        if qty <= 0 {
            return Money::zero();
        }
        let doubled = self.0 as i128 * 2;
        let divisor = qty as i128 * 2;
        let rounded = if doubled >= 0 {
            (doubled + qty as i128) / divisor
        } else {
            (doubled - qty as i128) / divisor
        };
        Money(rounded as i64)
    }

    /// Expresses `self` as a rate of `base`, rounded to a basis point
    /// (a percentage with two decimals).
    ///
    /// Returns a zero rate when `base` is zero or the ratio is negative.
    ///
    /// ## Example
    /// ```rust
    /// use taxcloud_core::money::Money;
    ///
    /// let tax = Money::from_cents(50);
    /// let row_total = Money::from_cents(1000);
    /// assert_eq!(tax.rate_of(row_total).bps(), 500); // 5.00%
    /// ```
    pub fn rate_of(&self, base: Money) -> TaxRate {
        if base.is_zero() {
            return TaxRate::zero();
        }
        let numerator = self.0 as i128 * 10000;
        let denominator = base.0 as i128;
        // Round half away from zero on the absolute values
        let bps = (numerator.abs() * 2 + denominator.abs()) / (denominator.abs() * 2);
        let negative = (numerator < 0) != (denominator < 0);
        if negative || bps == 0 {
            return TaxRate::zero();
        }
        TaxRate::from_bps(bps.min(u32::MAX as i128) as u32)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_wire_amounts() {
        assert_eq!(Money::from_wire_amount(10.99).cents(), 1099);
        assert_eq!(Money::from_wire_amount(0.5).cents(), 50);
        assert_eq!(Money::from_wire_amount(0.825).cents(), 83);
        assert_eq!(Money::from_wire_amount(-1.005).cents(), -101);
        assert_eq!(Money::from_wire_amount(f64::NAN).cents(), 0);
        assert_eq!(Money::from_cents(1050).to_wire_amount(), 10.5);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        let amount = Money::from_cents(1000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(1000)).cents(), 100);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)).cents(), 83);
    }

    #[test]
    fn test_divide_by_quantity() {
        assert_eq!(Money::from_cents(200).divide_by_quantity(2).cents(), 100);
        assert_eq!(Money::from_cents(100).divide_by_quantity(3).cents(), 33);
        assert_eq!(Money::from_cents(5).divide_by_quantity(2).cents(), 3);
        assert_eq!(Money::from_cents(-5).divide_by_quantity(2).cents(), -3);
        assert!(Money::from_cents(100).divide_by_quantity(-1).is_zero());
    }

    #[test]
    fn test_rate_of() {
        // 0.50 on 10.00 is 5%
        assert_eq!(Money::from_cents(50).rate_of(Money::from_cents(1000)).bps(), 500);
        // 1.00 on 3.00 is 33.33%
        assert_eq!(Money::from_cents(100).rate_of(Money::from_cents(300)).bps(), 3333);
        // 2.00 on 3.00 is 66.67%
        assert_eq!(Money::from_cents(200).rate_of(Money::from_cents(300)).bps(), 6667);
        assert!(Money::from_cents(50).rate_of(Money::zero()).is_zero());
    }

    #[test]
    fn test_sum_and_checks() {
        let total: Money = [100, 250, -50].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 300);
        assert!(total.is_positive());
        assert!(Money::default().is_zero());
    }
}
