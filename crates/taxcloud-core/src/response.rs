//! # Cart Item Response Handling
//!
//! Turns the service's `CartItemsResponse` into per-line tax amounts.
//!
//! The service is inconsistent about the shape of this field. A cart with one
//! line comes back as a bare object, several lines as a list, and either may
//! sit inside a `{"CartItemResponse": ...}` wrapper. Normalization accepts all
//! of them and drops anything it cannot read.
//!
//! ```text
//! raw JSON ──► normalize_cart_item_response ──► [CartItemTax]
//!                                                    │
//!      request cartItems + index→code ───────────────┤
//!                                                    ▼
//!                                          apply_to_result
//!                                    ┌───────────────┴──────────────┐
//!                          ItemID == "shipping"              any other line
//!                          shipping_tax += amount      product_tax[code] = amount
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::money::Money;
use crate::wire::CartItem;

/// Tax computed for one request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItemTax {
    /// `Index` of the request line.
    pub index: usize,
    pub tax_amount: Money,
}

/// Tax per product line code plus the shipping tax. Cached as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLookupResult {
    pub product_tax: BTreeMap<String, Money>,
    pub shipping_tax: Money,
}

impl TaxLookupResult {
    /// The zero result: no product tax and no shipping tax.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.shipping_tax.is_zero() && self.product_tax.values().all(Money::is_zero)
    }

    /// Tax of a product line, zero when the line was not priced.
    pub fn product_tax_for(&self, code: &str) -> Money {
        self.product_tax.get(code).copied().unwrap_or_default()
    }

    /// Product plus shipping tax.
    pub fn total(&self) -> Money {
        self.product_tax.values().copied().sum::<Money>() + self.shipping_tax
    }
}

/// Reads every well-formed `{CartItemIndex, TaxAmount}` entry out of `raw`.
///
/// Scalars, `null` and empty lists yield nothing. Entries that are not
/// objects or lack either field are skipped.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use taxcloud_core::response::normalize_cart_item_response;
///
/// let single = json!({"CartItemIndex": 0, "TaxAmount": 0.5});
/// assert_eq!(normalize_cart_item_response(&single).len(), 1);
///
/// assert!(normalize_cart_item_response(&json!("invalid")).is_empty());
/// ```
pub fn normalize_cart_item_response(raw: &Value) -> Vec<CartItemTax> {
    match raw {
        Value::Array(entries) => entries.iter().filter_map(read_entry).collect(),
        Value::Object(map) => match map.get("CartItemResponse") {
            Some(inner) => normalize_cart_item_response(inner),
            None => read_entry(raw).into_iter().collect(),
        },
        _ => Vec::new(),
    }
}

fn read_entry(entry: &Value) -> Option<CartItemTax> {
    let map = entry.as_object()?;
    let index = read_index(map.get("CartItemIndex")?)?;
    let tax_amount = read_amount(map.get("TaxAmount")?)?;
    Some(CartItemTax { index, tax_amount })
}

fn read_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_amount(value: &Value) -> Option<Money> {
    match value {
        Value::Number(n) => n.as_f64().map(Money::from_wire_amount),
        Value::String(s) => s.trim().parse::<f64>().ok().map(Money::from_wire_amount),
        _ => None,
    }
}

/// Folds normalized amounts into `result`.
///
/// `request_lines` are the `cartItems` that were sent; `indexed_codes` maps
/// each product line's `Index` to its line item code.
pub fn apply_to_result(
    items: &[CartItemTax],
    request_lines: &[CartItem],
    indexed_codes: &BTreeMap<usize, String>,
    result: &mut TaxLookupResult,
) {
    for item in items {
        let Some(line) = request_lines.iter().find(|l| l.index == item.index) else {
            tracing::warn!(
                target: "taxcloud",
                index = item.index,
                "Cart item response refers to an unknown line, skipping"
            );
            continue;
        };

        if line.is_shipping() {
            result.shipping_tax += item.tax_amount;
            continue;
        }

        match indexed_codes.get(&item.index) {
            Some(code) => {
                result.product_tax.insert(code.clone(), item.tax_amount);
            }
            None => tracing::warn!(
                target: "taxcloud",
                index = item.index,
                item_id = %line.item_id,
                "No line item code recorded for cart item, skipping"
            ),
        }
    }
}

/// Normalizes `raw` and applies it to `result`.
pub fn process_and_apply(
    raw: &Value,
    request_lines: &[CartItem],
    indexed_codes: &BTreeMap<usize, String>,
    result: &mut TaxLookupResult,
) {
    let items = normalize_cart_item_response(raw);
    apply_to_result(&items, request_lines, indexed_codes, result);
}
