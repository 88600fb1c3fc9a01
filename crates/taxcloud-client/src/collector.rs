//! # Tax Totals Collector
//!
//! The hook the host checkout calls while it collects quote totals. It asks
//! [`TaxCloudApi`] for tax and writes the answer onto every line and onto the
//! address totals.
//!
//! ## Collection Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  collect(quote, assignment, totals)                                     │
//! │                                                                         │
//! │  clear tax totals                                                       │
//! │      │                                                                  │
//! │      ├── no items ─────────────────────────────────────► done           │
//! │      │                                                                  │
//! │      ├── integration disabled ──► native calculator ─┐                  │
//! │      │                                               │                  │
//! │      └── enabled ──► lookup_taxes ───────────────────┤                  │
//! │                                                      ▼                  │
//! │                          write line tax (products, shipping)           │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                          aggregate totals + reconcile                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Fields
//! For a line with unit price `p`, quantity `q`, row total `r` and tax `t`:
//! - `row_tax = t`
//! - `price_incl_tax = p + t / q`
//! - `row_total_incl_tax = r + t`
//! - `tax_percent = t / r` to two decimals, `0` when `r` is zero
//! - `applied_taxes` cleared

use std::sync::Arc;
use tracing::{debug, info};

use taxcloud_core::money::Money;
use taxcloud_core::response::TaxLookupResult;
use taxcloud_core::types::{LineTax, Quote, QuoteTotals, ShippingAssignment};
use taxcloud_core::{FallbackCalculator, TAX_CLASS_NONE};

use crate::api::TaxCloudApi;
use crate::cache::ResponseCache;
use crate::config::TaxCloudConfig;
use crate::transport::TaxTransport;

/// Writes remote (or native) tax onto a quote.
pub struct TaxTotalsCollector<T, C> {
    api: Arc<TaxCloudApi<T, C>>,
    native: Arc<dyn FallbackCalculator>,
    enabled: bool,
}

impl<T: TaxTransport, C: ResponseCache> TaxTotalsCollector<T, C> {
    /// The native calculator is the configured rate table; with the
    /// `[fallback]` section left at defaults it charges no tax.
    pub fn new(config: &TaxCloudConfig, api: Arc<TaxCloudApi<T, C>>) -> Self {
        Self {
            api,
            native: Arc::new(config.fallback.calculator()),
            enabled: config.is_enabled(),
        }
    }

    /// Replaces the calculator used while the integration is disabled.
    pub fn with_native(mut self, native: Arc<dyn FallbackCalculator>) -> Self {
        self.native = native;
        self
    }

    pub async fn collect(&self, quote: &Quote, assignment: &mut ShippingAssignment, totals: &mut QuoteTotals) {
        totals.clear_tax();
        if assignment.items.is_empty() {
            return;
        }

        let taxes = if self.enabled {
            self.api.lookup_taxes(quote, assignment).await
        } else {
            debug!(target: "taxcloud", "TaxCloud disabled, using native tax calculation");
            self.native.calculate(assignment)
        };

        apply_taxes(assignment, &taxes, totals);
    }
}

/// Writes `taxes` onto the assignment's lines and aggregates `totals`.
pub fn apply_taxes(assignment: &mut ShippingAssignment, taxes: &TaxLookupResult, totals: &mut QuoteTotals) {
    let mut product_tax = Money::zero();
    for item in assignment.items.iter_mut() {
        let tax = if item.tax_class_id == TAX_CLASS_NONE || item.qty == 0 {
            Money::zero()
        } else {
            taxes.product_tax_for(&item.code)
        };
        write_line_tax(&mut item.tax, item.unit_price, item.row_total, item.qty, tax);
        product_tax += tax;

        totals.tax_amount += tax;
        totals.add_total_amount(QuoteTotals::TAX, tax);
    }

    let mut shipping_tax = Money::zero();
    if let Some(shipping) = assignment.shipping.as_mut() {
        shipping_tax = taxes.shipping_tax;
        write_line_tax(&mut shipping.tax, shipping.row_total, shipping.row_total, 1, shipping_tax);

        totals.tax_amount += shipping_tax;
        totals.shipping_tax_amount += shipping_tax;
        totals.add_total_amount(QuoteTotals::TAX, shipping_tax);
    }

    reconcile_tax_total(totals, product_tax, shipping_tax);
}

fn write_line_tax(tax: &mut LineTax, price: Money, row_total: Money, qty: i64, amount: Money) {
    tax.row_tax = amount;
    tax.price_incl_tax = price + amount.divide_by_quantity(qty);
    tax.row_total_incl_tax = row_total + amount;
    tax.applied_taxes.clear();
    tax.tax_percent = amount.rate_of(row_total);
}

/// Makes sure the address tax total carries all product tax.
///
/// When `tax_amount` is below `product_tax + shipping_tax`, the difference is
/// added to `tax_amount` and to the `tax` total amount. Returns whether a
/// correction was made.
pub fn reconcile_tax_total(totals: &mut QuoteTotals, product_tax: Money, shipping_tax: Money) -> bool {
    let expected = product_tax + shipping_tax;
    if totals.tax_amount >= expected {
        return false;
    }

    let missing = expected - totals.tax_amount;
    info!(
        target: "taxcloud",
        current = %totals.tax_amount,
        expected = %expected,
        missing = %missing,
        "Product tax missing from totals, adding it"
    );
    totals.tax_amount = expected;
    totals.add_total_amount(QuoteTotals::TAX, missing);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::*;
    use crate::cache::MemoryCache;
    use serde_json::json;
    use std::collections::BTreeMap;
    use taxcloud_core::types::TaxRate;
    use taxcloud_core::RateTableCalculator;

    type TestCollector = TaxTotalsCollector<Arc<ScriptedTransport>, MemoryCache>;

    fn collector(config: &TaxCloudConfig, transport: &Arc<ScriptedTransport>) -> TestCollector {
        let api = TaxCloudApi::new(config, Arc::clone(transport), MemoryCache::new(), catalog());
        TaxTotalsCollector::new(config, Arc::new(api))
    }

    fn taxes(product: &[(&str, i64)], shipping: i64) -> TaxLookupResult {
        TaxLookupResult {
            product_tax: product
                .iter()
                .map(|(code, cents)| (code.to_string(), Money::from_cents(*cents)))
                .collect::<BTreeMap<_, _>>(),
            shipping_tax: Money::from_cents(shipping),
        }
    }

    #[test]
    fn test_line_fields_from_tax() {
        let mut assignment = assignment();
        assignment.items[0].tax.applied_taxes = vec!["US-MN-*-Rate 1".into()];
        let mut totals = QuoteTotals::default();

        apply_taxes(&mut assignment, &taxes(&[("item-1", 50)], 0), &mut totals);

        let tax = &assignment.items[0].tax;
        assert_eq!(tax.row_tax, Money::from_cents(50));
        assert_eq!(tax.price_incl_tax, Money::from_cents(1050));
        assert_eq!(tax.row_total_incl_tax, Money::from_cents(1050));
        assert_eq!(tax.tax_percent, TaxRate::from_bps(500));
        assert!(tax.applied_taxes.is_empty());
    }

    #[test]
    fn test_price_incl_tax_spreads_across_quantity() {
        let mut assignment = assignment();
        let mut totals = QuoteTotals::default();

        // item-2: 2 x $20.00, $3.30 tax
        apply_taxes(&mut assignment, &taxes(&[("item-2", 330)], 0), &mut totals);

        let tax = &assignment.items[1].tax;
        assert_eq!(tax.price_incl_tax, Money::from_cents(2165));
        assert_eq!(tax.row_total_incl_tax, Money::from_cents(4330));
        assert_eq!(tax.tax_percent, TaxRate::from_bps(825));
    }

    #[test]
    fn test_tax_class_none_and_zero_qty_get_no_tax() {
        let mut assignment = assignment();
        assignment.items[0].tax_class_id = 0;
        assignment.items[1].qty = 0;
        let mut totals = QuoteTotals::default();

        apply_taxes(&mut assignment, &taxes(&[("item-1", 50), ("item-2", 100)], 0), &mut totals);

        assert!(assignment.items[0].tax.row_tax.is_zero());
        assert!(assignment.items[1].tax.row_tax.is_zero());
        assert!(totals.tax_amount.is_zero());
    }

    #[test]
    fn test_zero_row_total_has_zero_percent() {
        let mut assignment = assignment();
        assignment.items[0].row_total = Money::zero();
        let mut totals = QuoteTotals::default();

        apply_taxes(&mut assignment, &taxes(&[("item-1", 50)], 0), &mut totals);
        assert!(assignment.items[0].tax.tax_percent.is_zero());
    }

    #[test]
    fn test_shipping_and_totals() {
        let mut assignment = assignment();
        let mut totals = QuoteTotals::default();

        apply_taxes(&mut assignment, &taxes(&[("item-1", 50), ("item-2", 275)], 25), &mut totals);

        let shipping = &assignment.shipping.as_ref().unwrap().tax;
        assert_eq!(shipping.row_tax, Money::from_cents(25));
        assert_eq!(shipping.price_incl_tax, Money::from_cents(525));
        assert_eq!(shipping.tax_percent, TaxRate::from_bps(500));

        assert_eq!(totals.tax_amount, Money::from_cents(350));
        assert_eq!(totals.shipping_tax_amount, Money::from_cents(25));
        assert_eq!(totals.total_amount(QuoteTotals::TAX), Money::from_cents(350));
    }

    #[test]
    fn test_reconcile_adds_missing_product_tax() {
        let mut totals = QuoteTotals::default();
        totals.tax_amount = Money::from_cents(250);

        let corrected = reconcile_tax_total(&mut totals, Money::from_cents(500), Money::from_cents(250));

        assert!(corrected);
        assert_eq!(totals.tax_amount, Money::from_cents(750));
        assert_eq!(totals.total_amount(QuoteTotals::TAX), Money::from_cents(500));
    }

    #[test]
    fn test_reconcile_leaves_complete_totals() {
        let mut totals = QuoteTotals::default();
        totals.tax_amount = Money::from_cents(750);
        assert!(!reconcile_tax_total(&mut totals, Money::from_cents(500), Money::from_cents(250)));
        assert_eq!(totals.tax_amount, Money::from_cents(750));
    }

    #[tokio::test]
    async fn test_collect_writes_remote_tax() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(lookup_ok())]));
        let collector = collector(&config(), &transport);
        let mut assignment = assignment();
        let mut totals = QuoteTotals::default();

        collector.collect(&quote(), &mut assignment, &mut totals).await;

        assert_eq!(assignment.items[0].tax.row_tax, Money::from_cents(50));
        assert_eq!(assignment.items[1].tax.row_tax, Money::from_cents(275));
        assert_eq!(totals.tax_amount, Money::from_cents(350));
        assert_eq!(totals.shipping_tax_amount, Money::from_cents(25));
    }

    #[tokio::test]
    async fn test_collect_clears_previous_totals() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let collector = collector(&config(), &transport);
        let mut assignment = assignment();
        assignment.items.clear();
        let mut totals = QuoteTotals::default();
        totals.tax_amount = Money::from_cents(999);
        totals.add_total_amount(QuoteTotals::TAX, Money::from_cents(999));

        collector.collect(&quote(), &mut assignment, &mut totals).await;

        assert!(totals.tax_amount.is_zero());
        assert!(totals.total_amount(QuoteTotals::TAX).is_zero());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_collect_disabled_uses_native_calculator() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let mut config = config();
        config.settings.enabled = false;
        let collector = collector(&config, &transport)
            .with_native(Arc::new(RateTableCalculator::new(TaxRate::from_bps(500))));
        let mut assignment = assignment();
        let mut totals = QuoteTotals::default();

        collector.collect(&quote(), &mut assignment, &mut totals).await;

        assert_eq!(transport.calls(), 0);
        assert_eq!(assignment.items[0].tax.row_tax, Money::from_cents(50));
        assert_eq!(assignment.items[1].tax.row_tax, Money::from_cents(200));
        assert_eq!(totals.tax_amount, Money::from_cents(250));
    }

    #[tokio::test]
    async fn test_collect_remote_failure_zeroes_lines() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({"ResponseType": "Error"}))]));
        let collector = collector(&config(), &transport);
        let mut assignment = assignment();
        let mut totals = QuoteTotals::default();

        collector.collect(&quote(), &mut assignment, &mut totals).await;

        assert!(assignment.items.iter().all(|i| i.tax.row_tax.is_zero()));
        assert_eq!(assignment.items[0].tax.price_incl_tax, Money::from_cents(1000));
        assert!(totals.tax_amount.is_zero());
    }
}
