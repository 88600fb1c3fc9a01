//! # TIC Resolution
//!
//! Every cart line sent to the tax service carries a Taxability Information
//! Code. Products may override the store default through their
//! `taxcloud_tic` attribute; the host exposes that attribute through
//! [`TicSource`].
//!
//! ```text
//! line.product ──► None / no id ──► warn, default TIC
//!       │
//!       ▼
//! TicSource::custom_tic(id) ──► Some(code) ──► code
//!       │
//!       ▼ None
//! default TIC ("00000")
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{CreditMemoItem, LineItem, ProductRef};

/// Store default TIC when none is configured.
pub const DEFAULT_TIC: &str = "00000";

/// TIC of the shipping line when none is configured.
pub const SHIPPING_TIC: &str = "11010";

// =============================================================================
// Tic
// =============================================================================

/// A Taxability Information Code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tic(String);

impl Tic {
    pub fn new(code: impl Into<String>) -> Self {
        Tic(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Catalog Seam
// =============================================================================

/// Looks up a product's `taxcloud_tic` override in the host catalog.
pub trait TicSource {
    /// Returns the override code, or `None` when the product has none.
    fn custom_tic(&self, product_id: &str) -> Option<String>;
}

/// In-memory catalog keyed by product id.
impl TicSource for HashMap<String, String> {
    fn custom_tic(&self, product_id: &str) -> Option<String> {
        self.get(product_id).cloned()
    }
}

/// A line that points at a catalog product.
pub trait CatalogLine {
    fn sku(&self) -> &str;
    fn product(&self) -> Option<&ProductRef>;
}

impl CatalogLine for LineItem {
    fn sku(&self) -> &str {
        &self.sku
    }

    fn product(&self) -> Option<&ProductRef> {
        self.product.as_ref()
    }
}

impl CatalogLine for CreditMemoItem {
    fn sku(&self) -> &str {
        &self.sku
    }

    fn product(&self) -> Option<&ProductRef> {
        self.product.as_ref()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves the TIC for each line, tolerating deleted products.
#[derive(Clone)]
pub struct TicResolver {
    source: Arc<dyn TicSource + Send + Sync>,
    default_tic: Tic,
    shipping_tic: Tic,
}

impl TicResolver {
    /// Creates a resolver with the store's configured default and shipping
    /// TICs.
    pub fn new(
        source: Arc<dyn TicSource + Send + Sync>,
        default_tic: impl Into<String>,
        shipping_tic: impl Into<String>,
    ) -> Self {
        Self {
            source,
            default_tic: Tic::new(default_tic),
            shipping_tic: Tic::new(shipping_tic),
        }
    }

    /// Resolver with the built-in `00000` / `11010` codes.
    pub fn with_defaults(source: Arc<dyn TicSource + Send + Sync>) -> Self {
        Self::new(source, DEFAULT_TIC, SHIPPING_TIC)
    }

    pub fn default_tic(&self) -> &Tic {
        &self.default_tic
    }

    pub fn shipping_tic(&self) -> &Tic {
        &self.shipping_tic
    }

    /// Whether the line still points at an existing catalog product.
    pub fn is_product_valid(&self, line: &impl CatalogLine) -> bool {
        product_id(line).is_some()
    }

    /// Resolves the TIC for `line`. `context` names the calling operation in
    /// the log line emitted for deleted products.
    pub fn resolve(&self, line: &impl CatalogLine, context: &str) -> Tic {
        let Some(id) = product_id(line) else {
            tracing::info!(
                target: "taxcloud",
                sku = line.sku(),
                context,
                "Product not found for item {} in {}, using default TIC",
                line.sku(),
                context
            );
            return self.default_tic.clone();
        };

        self.source
            .custom_tic(id)
            .filter(|code| !code.trim().is_empty())
            .map(Tic::new)
            .unwrap_or_else(|| self.default_tic.clone())
    }

    /// Resolves the TIC and reports whether the product was found.
    pub fn resolve_with_validation(&self, line: &impl CatalogLine, context: &str) -> (Tic, bool) {
        (self.resolve(line, context), self.is_product_valid(line))
    }
}

impl fmt::Debug for TicResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicResolver")
            .field("default_tic", &self.default_tic)
            .field("shipping_tic", &self.shipping_tic)
            .finish_non_exhaustive()
    }
}

fn product_id(line: &impl CatalogLine) -> Option<&str> {
    line.product()
        .and_then(|p| p.id.as_deref())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::LineTax;

    fn catalog() -> Arc<dyn TicSource + Send + Sync> {
        let mut map = HashMap::new();
        map.insert("42".to_string(), "20010".to_string());
        map.insert("43".to_string(), "  ".to_string());
        Arc::new(map)
    }

    fn item(product: Option<ProductRef>) -> LineItem {
        LineItem {
            code: "sequence-1".into(),
            sku: "TSHIRT".into(),
            product,
            tax_class_id: 2,
            unit_price: Money::from_cents(1000),
            qty: 1,
            discount: Money::zero(),
            row_total: Money::from_cents(1000),
            tax: LineTax::default(),
        }
    }

    fn product(id: &str) -> Option<ProductRef> {
        Some(ProductRef {
            id: Some(id.to_string()),
        })
    }

    #[test]
    fn test_resolve_custom_tic() {
        let resolver = TicResolver::with_defaults(catalog());
        assert_eq!(resolver.resolve(&item(product("42")), "lookupTaxes").as_str(), "20010");
    }

    #[test]
    fn test_resolve_without_override_uses_default() {
        let resolver = TicResolver::with_defaults(catalog());
        assert_eq!(resolver.resolve(&item(product("7")), "lookupTaxes").as_str(), "00000");
        // Blank attribute counts as unset
        assert_eq!(resolver.resolve(&item(product("43")), "lookupTaxes").as_str(), "00000");
    }

    #[test]
    fn test_resolve_deleted_product_uses_configured_default() {
        let resolver = TicResolver::new(catalog(), "31000", "11000");
        assert_eq!(resolver.resolve(&item(None), "returnOrder").as_str(), "31000");
        let no_id = Some(ProductRef { id: None });
        assert_eq!(resolver.resolve(&item(no_id), "returnOrder").as_str(), "31000");
    }

    #[test]
    fn test_resolve_with_validation() {
        let resolver = TicResolver::with_defaults(catalog());
        let (tic, valid) = resolver.resolve_with_validation(&item(product("42")), "lookupTaxes");
        assert_eq!(tic.as_str(), "20010");
        assert!(valid);

        let (tic, valid) = resolver.resolve_with_validation(&item(None), "lookupTaxes");
        assert_eq!(tic.as_str(), "00000");
        assert!(!valid);
    }

    #[test]
    fn test_default_and_shipping_tics() {
        let resolver = TicResolver::with_defaults(catalog());
        assert_eq!(resolver.default_tic().as_str(), DEFAULT_TIC);
        assert_eq!(resolver.shipping_tic().as_str(), SHIPPING_TIC);
        assert!(!resolver.is_product_valid(&item(product(""))));
    }
}
