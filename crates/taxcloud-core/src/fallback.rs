//! # Native Fallback Calculator
//!
//! When the integration is switched off, or the tax service cannot be
//! reached, tax comes from the host's own engine. [`FallbackCalculator`] is
//! that seam; [`RateTableCalculator`] is a rate-per-state implementation that
//! ships with the integration.
//!
//! ```text
//! ShippingAssignment ──► region ("MN") ──► region_rates / default_rate
//!                                                │
//!              line.discounted_row_total() ──────┼──► calculate_tax ──► product_tax[code]
//!              shipping.row_total (if taxable) ──┘                  ──► shipping_tax
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::response::TaxLookupResult;
use crate::types::{ShippingAssignment, TaxRate};
use crate::TAX_CLASS_NONE;

/// Host-native tax computation.
pub trait FallbackCalculator: Send + Sync {
    fn calculate(&self, assignment: &ShippingAssignment) -> TaxLookupResult;
}

/// Flat rate per destination state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTableCalculator {
    /// Rate for states without an entry.
    pub default_rate: TaxRate,
    /// Rate by two-letter state code.
    #[serde(default)]
    pub region_rates: BTreeMap<String, TaxRate>,
    /// Whether shipping charges are taxed.
    #[serde(default)]
    pub shipping_taxable: bool,
}

impl RateTableCalculator {
    pub fn new(default_rate: TaxRate) -> Self {
        Self {
            default_rate,
            ..Default::default()
        }
    }

    pub fn with_region_rate(mut self, region: impl Into<String>, rate: TaxRate) -> Self {
        self.region_rates.insert(region.into().to_uppercase(), rate);
        self
    }

    pub fn with_shipping_taxable(mut self, taxable: bool) -> Self {
        self.shipping_taxable = taxable;
        self
    }

    /// Rate applied to a destination state.
    pub fn rate_for(&self, region: Option<&str>) -> TaxRate {
        region
            .and_then(|r| self.region_rates.get(&r.trim().to_uppercase()))
            .copied()
            .unwrap_or(self.default_rate)
    }
}

impl FallbackCalculator for RateTableCalculator {
    fn calculate(&self, assignment: &ShippingAssignment) -> TaxLookupResult {
        let region = assignment.address.as_ref().and_then(|a| a.region.as_deref());
        let rate = self.rate_for(region);
        let mut result = TaxLookupResult::zero();

        for item in &assignment.items {
            if item.tax_class_id == TAX_CLASS_NONE || item.qty == 0 {
                continue;
            }
            let tax = item.discounted_row_total().calculate_tax(rate);
            result.product_tax.insert(item.code.clone(), tax);
        }

        if self.shipping_taxable {
            if let Some(shipping) = &assignment.shipping {
                result.shipping_tax = shipping.row_total.calculate_tax(rate);
            }
        }

        result
    }
}
