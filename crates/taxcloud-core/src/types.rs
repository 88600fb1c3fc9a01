//! # Domain Types
//!
//! The host checkout pipeline hands the integration plain data: a quote with
//! its shipping assignment, a placed order, or a credit memo. These types are
//! that contract.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Domain Types                                     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌────────────────────┐   ┌─────────────────┐    │
//! │  │     Quote       │   │ ShippingAssignment │   │  QuoteTotals    │    │
//! │  │  ─────────────  │   │  ────────────────  │   │  ─────────────  │    │
//! │  │  id (cartID)    │   │  address           │   │  tax_amount     │    │
//! │  │  customer       │   │  items: LineItem[] │   │  shipping_tax   │    │
//! │  └─────────────────┘   │  shipping          │   │  total_amounts  │    │
//! │                        └────────────────────┘   └─────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌────────────────────┐   ┌─────────────────┐    │
//! │  │     Order       │   │    CreditMemo      │   │ CaptureTrigger  │    │
//! │  │  increment_id   │   │  order             │   │  OrderCreation  │    │
//! │  │  quote_id       │   │  items             │   │  Payment        │    │
//! │  │  customer       │   │  shipping_amount   │   │  Shipment       │    │
//! │  └─────────────────┘   └────────────────────┘   └─────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 825 bps = 8.25%, which is also the two-decimal `tax_percent` the host
/// stores on a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Address & Customer
// =============================================================================

/// A postal address as the host stores it.
///
/// Every field is optional because the checkout may call the collector
/// before the shopper has finished typing; the lookup preconditions decide
/// what is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street lines; only the first two are sent.
    #[serde(default)]
    pub street: Vec<String>,

    pub city: Option<String>,

    /// Two-letter state code (`MN`, `CA`).
    pub region: Option<String>,

    pub postcode: Option<String>,

    /// ISO 3166-1 alpha-2 country code.
    pub country_id: Option<String>,
}

impl Address {
    /// Street line `n` (0-based), empty when absent.
    pub fn street_line(&self, n: usize) -> &str {
        self.street.get(n).map(String::as_str).unwrap_or("")
    }
}

/// The shopper a quote or order belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Host customer id; `None` for guest checkout.
    pub id: Option<String>,

    /// Value of the customer's `taxcloud_cert` attribute.
    pub exemption_certificate: Option<String>,
}

// =============================================================================
// Quote Lines
// =============================================================================

/// Reference to the catalog product behind a line.
///
/// `None` on the line, or a `None` id, means the product was deleted after it
/// was added to the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: Option<String>,
}

/// Tax fields the collector writes back onto a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTax {
    pub row_tax: Money,
    pub price_incl_tax: Money,
    pub row_total_incl_tax: Money,
    pub tax_percent: TaxRate,
    /// Host-native applied tax breakdown. Cleared whenever remote tax is applied.
    #[serde(default)]
    pub applied_taxes: Vec<String>,
}

/// A product line of the quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Tax-calculation item code; the key of `TaxLookupResult::product_tax`.
    pub code: String,
    pub sku: String,
    pub product: Option<ProductRef>,
    /// `0` means the product's tax class is "None".
    #[serde(default)]
    pub tax_class_id: u32,
    pub unit_price: Money,
    pub qty: i64,
    #[serde(default)]
    pub discount: Money,
    pub row_total: Money,
    #[serde(default)]
    pub tax: LineTax,
}

impl LineItem {
    /// Unit price after spreading the line discount across the quantity.
    pub fn discounted_unit_price(&self) -> Money {
        self.unit_price - self.discount.divide_by_quantity(self.qty)
    }

    /// Row total after discount; the base for local rate-table tax.
    pub fn discounted_row_total(&self) -> Money {
        self.row_total - self.discount
    }
}

/// The shipping charge of a quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingLine {
    pub row_total: Money,
    #[serde(default)]
    pub tax: LineTax,
}

/// Items, destination and shipping charge the collector is asked to tax.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingAssignment {
    pub address: Option<Address>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub shipping: Option<ShippingLine>,
}

/// In-progress cart before order placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quote {
    /// Sent as `cartID`.
    pub id: String,
    #[serde(default)]
    pub customer: Customer,
}

// =============================================================================
// Quote Totals
// =============================================================================

/// Tax totals of a quote address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub tax_amount: Money,
    pub shipping_tax_amount: Money,
    /// Named total amounts (`tax`, `shipping`, ...), as the host keeps them.
    #[serde(default)]
    pub total_amounts: BTreeMap<String, Money>,
}

impl QuoteTotals {
    /// Name of the total that carries tax.
    pub const TAX: &'static str = "tax";

    /// Adds `amount` to the named total.
    pub fn add_total_amount(&mut self, code: &str, amount: Money) {
        *self.total_amounts.entry(code.to_string()).or_default() += amount;
    }

    /// Reads a named total (zero when unset).
    pub fn total_amount(&self, code: &str) -> Money {
        self.total_amounts.get(code).copied().unwrap_or_default()
    }

    /// Resets every tax-related value before a collection run.
    pub fn clear_tax(&mut self) {
        self.tax_amount = Money::zero();
        self.shipping_tax_amount = Money::zero();
        self.total_amounts.remove(Self::TAX);
    }
}

// =============================================================================
// Orders & Credit Memos
// =============================================================================

/// A placed order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    /// Human-facing order number, sent as `orderID`.
    pub increment_id: String,
    /// Id of the quote the order was placed from, sent as `cartID`.
    pub quote_id: String,
    #[serde(default)]
    pub customer: Customer,
}

/// A refunded line of a credit memo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditMemoItem {
    pub sku: String,
    pub product: Option<ProductRef>,
    pub unit_price: Money,
    pub qty: i64,
    #[serde(default)]
    pub discount: Money,
}

impl CreditMemoItem {
    pub fn discounted_unit_price(&self) -> Money {
        self.unit_price - self.discount.divide_by_quantity(self.qty)
    }
}

/// A refund against a placed order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreditMemo {
    pub order: Order,
    #[serde(default)]
    pub items: Vec<CreditMemoItem>,
    #[serde(default)]
    pub shipping_amount: Money,
}

// =============================================================================
// Capture Trigger
// =============================================================================

/// The order lifecycle event that commits a transaction to the tax service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTrigger {
    /// Capture as soon as the order is placed.
    OrderCreation,
    /// Capture when the invoice is paid.
    Payment,
    /// Capture when the order ships.
    Shipment,
}

impl CaptureTrigger {
    /// Every trigger with its admin label, in display order.
    pub fn options() -> [(CaptureTrigger, &'static str); 3] {
        [
            (CaptureTrigger::OrderCreation, "On order creation"),
            (CaptureTrigger::Payment, "On payment"),
            (CaptureTrigger::Shipment, "On shipment"),
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureTrigger::OrderCreation => "order_creation",
            CaptureTrigger::Payment => "payment",
            CaptureTrigger::Shipment => "shipment",
        }
    }

    /// Whether `event` is the lifecycle event this trigger waits for.
    pub fn matches(&self, event: OrderEvent) -> bool {
        matches!(
            (self, event),
            (CaptureTrigger::OrderCreation, OrderEvent::Placed)
                | (CaptureTrigger::Payment, OrderEvent::InvoicePaid)
                | (CaptureTrigger::Shipment, OrderEvent::Shipped)
        )
    }
}

impl Default for CaptureTrigger {
    fn default() -> Self {
        CaptureTrigger::OrderCreation
    }
}

impl fmt::Display for CaptureTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureTrigger {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "order_creation" => Ok(CaptureTrigger::OrderCreation),
            "payment" => Ok(CaptureTrigger::Payment),
            "shipment" => Ok(CaptureTrigger::Shipment),
            other => Err(CoreError::UnknownCaptureTrigger(other.to_string())),
        }
    }
}

/// Order lifecycle events the host reports to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    Placed,
    InvoicePaid,
    Shipped,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit: i64, qty: i64, discount: i64) -> LineItem {
        LineItem {
            code: "sequence-1".into(),
            sku: "SKU-1".into(),
            product: Some(ProductRef {
                id: Some("42".into()),
            }),
            tax_class_id: 2,
            unit_price: Money::from_cents(unit),
            qty,
            discount: Money::from_cents(discount),
            row_total: Money::from_cents(unit * qty),
            tax: LineTax::default(),
        }
    }

    #[test]
    fn test_tax_rate_from_bps() {
        assert_eq!(TaxRate::from_bps(825).bps(), 825);
        assert!(TaxRate::default().is_zero());
    }

    #[test]
    fn test_discounted_unit_price() {
        // $10.00 x 2 with $1.00 off → $9.50 per unit
        assert_eq!(line(1000, 2, 100).discounted_unit_price().cents(), 950);
        assert_eq!(line(1000, 2, 100).discounted_row_total().cents(), 1900);
        // Zero quantity never divides
        assert_eq!(line(1000, 0, 100).discounted_unit_price().cents(), 1000);
    }

    #[test]
    fn test_street_line() {
        let address = Address {
            street: vec!["1 Main St".into()],
            ..Default::default()
        };
        assert_eq!(address.street_line(0), "1 Main St");
        assert_eq!(address.street_line(1), "");
    }

    #[test]
    fn test_quote_totals_clear_and_add() {
        let mut totals = QuoteTotals::default();
        totals.add_total_amount(QuoteTotals::TAX, Money::from_cents(50));
        totals.add_total_amount(QuoteTotals::TAX, Money::from_cents(25));
        totals.add_total_amount("shipping", Money::from_cents(500));
        totals.tax_amount = Money::from_cents(75);
        assert_eq!(totals.total_amount(QuoteTotals::TAX).cents(), 75);

        totals.clear_tax();
        assert!(totals.tax_amount.is_zero());
        assert!(totals.total_amount(QuoteTotals::TAX).is_zero());
        assert_eq!(totals.total_amount("shipping").cents(), 500);
    }

    #[test]
    fn test_capture_trigger_parse_and_display() {
        assert_eq!(
            "payment".parse::<CaptureTrigger>().unwrap(),
            CaptureTrigger::Payment
        );
        assert_eq!(
            " Shipment ".parse::<CaptureTrigger>().unwrap(),
            CaptureTrigger::Shipment
        );
        assert!("invoice".parse::<CaptureTrigger>().is_err());
        assert_eq!(CaptureTrigger::OrderCreation.to_string(), "order_creation");
        assert_eq!(CaptureTrigger::default(), CaptureTrigger::OrderCreation);
    }

    #[test]
    fn test_capture_trigger_options() {
        let labels: Vec<&str> = CaptureTrigger::options().iter().map(|(_, l)| *l).collect();
        assert_eq!(labels, vec!["On order creation", "On payment", "On shipment"]);
    }

    #[test]
    fn test_capture_trigger_matches_event() {
        assert!(CaptureTrigger::OrderCreation.matches(OrderEvent::Placed));
        assert!(CaptureTrigger::Payment.matches(OrderEvent::InvoicePaid));
        assert!(CaptureTrigger::Shipment.matches(OrderEvent::Shipped));
        assert!(!CaptureTrigger::Payment.matches(OrderEvent::Placed));
        assert!(!CaptureTrigger::OrderCreation.matches(OrderEvent::Shipped));
    }
}
