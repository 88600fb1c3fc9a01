//! # TaxCloud API Orchestrator
//!
//! Builds requests from checkout state, calls the service with the retry
//! policy, caches what succeeded and maps answers back.
//!
//! ## Lookup Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lookup_taxes(quote, assignment)                                        │
//! │                                                                         │
//! │  1. destination preconditions ──fail──► log, zero result               │
//! │  2. cart lines (skip tax class None) + shipping line                   │
//! │     no lines ──► zero result                                           │
//! │  3. (optional) verify_address ──► replace destination                  │
//! │  4. LookupRequest                                                       │
//! │  5. cache key "taxcloud_rates_"+sha256 ──hit──► cached result          │
//! │  6. POST Lookup (2 attempts)                                           │
//! │  7. OK / Informational ──► map cart items, cache, return               │
//! │  8. anything else ──► log ──► fallback calculator or zero result       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups never return an error: the collector must always be able to
//! finish. The order-side calls (`authorize_capture`, `return_order`) do
//! return errors; the observer decides what to do with them.

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use taxcloud_core::response::{self, TaxLookupResult};
use taxcloud_core::tic::{TicResolver, TicSource};
use taxcloud_core::types::{CreditMemo, Customer, Order, Quote, ShippingAssignment};
use taxcloud_core::validation::validate_destination;
use taxcloud_core::wire::{
    unwrap_envelope, AuthorizedWithCaptureRequest, CartItem, Credentials, ExemptCert, LookupRequest,
    ReturnedRequest, ServiceResult, VerifyAddressRequest, VerifyAddressResult, WireAddress,
};
use taxcloud_core::{postal, FallbackCalculator, TAX_CLASS_NONE};

use crate::cache::{cache_key, ResponseCache, ADDRESS_PREFIX, RATES_PREFIX};
use crate::config::TaxCloudConfig;
use crate::error::{ClientError, ClientResult};
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{Operation, TaxTransport};

/// Leading text of the rejection the service sends when an order was already
/// captured.
pub const ALREADY_AUTHORIZED: &str = "This transaction has already been marked as authorized";

/// Outcome of a successful `authorize_capture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The service accepted the capture.
    Captured,
    /// A previous capture of the same order already went through.
    AlreadyAuthorized,
}

/// Verified form of an address, as returned by `VerifyAddress`.
pub type VerifiedAddress = WireAddress;

// =============================================================================
// Api
// =============================================================================

/// Client for the TaxCloud operations used by the checkout.
pub struct TaxCloudApi<T, C> {
    transport: T,
    cache: C,
    tics: TicResolver,
    credentials: Credentials,
    guest_customer_id: String,
    origin: WireAddress,
    cache_lifetime: Option<std::time::Duration>,
    verify_addresses: bool,
    return_co_delivery_fee: bool,
    fallback: Option<Arc<dyn FallbackCalculator>>,
    retry: RetryPolicy,
}

impl<T: TaxTransport, C: ResponseCache> TaxCloudApi<T, C> {
    /// Creates an API client from configuration.
    ///
    /// `catalog` answers per-product TIC overrides. The fallback calculator
    /// is the `[fallback]` rate table when enabled.
    pub fn new(
        config: &TaxCloudConfig,
        transport: T,
        cache: C,
        catalog: Arc<dyn TicSource + Send + Sync>,
    ) -> Self {
        let origin_postcode = postal::parse(config.origin.postcode.as_deref());
        let fallback: Option<Arc<dyn FallbackCalculator>> = if config.fallback.enabled {
            Some(Arc::new(config.fallback.calculator()))
        } else {
            None
        };

        Self {
            transport,
            cache,
            tics: TicResolver::new(
                catalog,
                config.settings.default_tic.clone(),
                config.settings.shipping_tic.clone(),
            ),
            credentials: Credentials {
                api_login_id: config.settings.api_id.clone(),
                api_key: config.settings.api_key.clone(),
            },
            guest_customer_id: config.settings.guest_customer_id.clone(),
            origin: WireAddress::from_address(&config.origin, &origin_postcode),
            cache_lifetime: config.cache_lifetime(),
            verify_addresses: config.settings.verify_address,
            return_co_delivery_fee: config.settings.return_co_delivery_fee_when_no_cart_items,
            fallback,
            retry: RetryPolicy::with_delay(config.service.retry_delay()),
        }
    }

    /// Replaces the calculator used when a lookup fails.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackCalculator>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tics(&self) -> &TicResolver {
        &self.tics
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Computes tax for the assignment's lines and shipping.
    ///
    /// Never fails: precondition failures give the zero result, remote
    /// failures give the fallback result (or zero when no fallback is set).
    pub async fn lookup_taxes(&self, quote: &Quote, assignment: &ShippingAssignment) -> TaxLookupResult {
        info!(target: "taxcloud", cart_id = %quote.id, "Calling lookupTaxes");

        let parsed = match validate_destination(assignment.address.as_ref()) {
            Ok(parsed) => parsed,
            Err(reason) => {
                info!(target: "taxcloud", %reason, "Destination not usable, returning 0");
                return TaxLookupResult::zero();
            }
        };
        let Some(address) = assignment.address.as_ref() else {
            return TaxLookupResult::zero();
        };

        let mut cart_items = Vec::new();
        let mut indexed_codes = BTreeMap::new();
        for item in &assignment.items {
            if item.tax_class_id == TAX_CLASS_NONE {
                debug!(target: "taxcloud", sku = %item.sku, "Skipping item with tax class None");
                continue;
            }
            let index = cart_items.len();
            let tic = self.tics.resolve(item, "lookupTaxes");
            cart_items.push(CartItem::new(
                item.sku.clone(),
                index,
                tic.as_str(),
                item.discounted_unit_price(),
                item.qty,
            ));
            indexed_codes.insert(index, item.code.clone());
        }
        if let Some(shipping) = &assignment.shipping {
            cart_items.push(CartItem::new(
                taxcloud_core::SHIPPING_ITEM_ID,
                cart_items.len(),
                self.tics.shipping_tic().as_str(),
                shipping.row_total,
                1,
            ));
        }

        if cart_items.is_empty() {
            info!(target: "taxcloud", "No cart items, returning 0");
            return TaxLookupResult::zero();
        }

        let mut destination = WireAddress::from_address(address, &parsed);
        if self.verify_addresses {
            match self.verify_address(&destination).await {
                Ok(Some(verified)) => destination = verified,
                Ok(None) => {}
                Err(e) => warn!(target: "taxcloud", error = %e, "Address verification failed, using address as entered"),
            }
        }

        let request = LookupRequest {
            credentials: self.credentials.clone(),
            customer_id: self.customer_id(&quote.customer),
            cart_id: quote.id.clone(),
            cart_items,
            origin: self.origin.clone(),
            destination,
            delivered_by_seller: false,
            exempt_cert: ExemptCert {
                certificate_id: quote.customer.exemption_certificate.clone(),
            },
        };

        let key = match cache_key(RATES_PREFIX, &request) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(target: "taxcloud", error = %e, "Could not build cache key");
                None
            }
        };
        if let Some(key) = &key {
            if let Some(cached) = self.cached::<TaxLookupResult>(key).await {
                info!(target: "taxcloud", "Using Cache");
                return cached;
            }
        }

        debug!(target: "taxcloud", ?request, "lookupTaxes PARAMS");
        let result = match self.call::<ServiceResult>(Operation::Lookup, &request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(target: "taxcloud", error = %e, "Error encountered during lookupTaxes");
                return self.fallback_result(assignment);
            }
        };

        if !result.response_type.is_success() {
            warn!(
                target: "taxcloud",
                response_type = ?result.response_type,
                detail = result.first_message().unwrap_or_default(),
                "Error encountered during lookupTaxes"
            );
            return self.fallback_result(assignment);
        }

        let mut taxes = TaxLookupResult::zero();
        response::process_and_apply(
            &result.cart_items_response,
            &request.cart_items,
            &indexed_codes,
            &mut taxes,
        );

        if let Some(key) = &key {
            self.store(key, &taxes).await;
        }

        taxes
    }

    fn fallback_result(&self, assignment: &ShippingAssignment) -> TaxLookupResult {
        match &self.fallback {
            Some(calculator) => {
                info!(target: "taxcloud", "Falling back to native tax rates");
                calculator.calculate(assignment)
            }
            None => TaxLookupResult::zero(),
        }
    }

    // =========================================================================
    // Authorize / Capture
    // =========================================================================

    /// Commits the order's transaction (authorize and capture in one step).
    pub async fn authorize_capture(&self, order: &Order) -> ClientResult<CaptureOutcome> {
        info!(target: "taxcloud", order_id = %order.increment_id, "Calling authorizeCapture");

        let now = now_rfc3339();
        let request = AuthorizedWithCaptureRequest {
            credentials: self.credentials.clone(),
            customer_id: self.customer_id(&order.customer),
            cart_id: order.quote_id.clone(),
            order_id: order.increment_id.clone(),
            date_authorized: now.clone(),
            date_captured: now,
        };
        debug!(target: "taxcloud", ?request, "authorizedWithCapture PARAMS");

        let result = self
            .call::<ServiceResult>(Operation::AuthorizedWithCapture, &request)
            .await
            .inspect_err(|e| warn!(target: "taxcloud", error = %e, "Error encountered during authorizeCapture"))?;

        if result.response_type == taxcloud_core::wire::ResponseType::Ok {
            return Ok(CaptureOutcome::Captured);
        }

        let message = result.first_message().unwrap_or_default();
        if message.starts_with(ALREADY_AUTHORIZED) {
            warn!(target: "taxcloud", order_id = %order.increment_id, "Warning encountered during authorizeCapture: Duplicate transaction");
            return Ok(CaptureOutcome::AlreadyAuthorized);
        }

        warn!(target: "taxcloud", detail = message, "Error encountered during authorizeCapture");
        Err(ClientError::rejected("AuthorizedWithCapture", result.first_message()))
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Reports a refund.
    pub async fn return_order(&self, credit_memo: &CreditMemo) -> ClientResult<()> {
        info!(target: "taxcloud", order_id = %credit_memo.order.increment_id, "Calling returnOrder");

        let mut cart_items: Vec<CartItem> = credit_memo
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let tic = self.tics.resolve(item, "returnOrder");
                CartItem::new(item.sku.clone(), index, tic.as_str(), item.discounted_unit_price(), item.qty)
            })
            .collect();

        if credit_memo.shipping_amount.is_positive() {
            cart_items.push(CartItem::new(
                taxcloud_core::SHIPPING_ITEM_ID,
                cart_items.len(),
                self.tics.shipping_tic().as_str(),
                credit_memo.shipping_amount,
                1,
            ));
        }

        let request = ReturnedRequest {
            credentials: self.credentials.clone(),
            order_id: credit_memo.order.increment_id.clone(),
            cart_items,
            returned_date: now_rfc3339(),
            return_co_delivery_fee_when_no_cart_items: self.return_co_delivery_fee,
        };
        debug!(target: "taxcloud", ?request, "returnOrder PARAMS");

        let result = self
            .call::<ServiceResult>(Operation::Returned, &request)
            .await
            .inspect_err(|e| warn!(target: "taxcloud", error = %e, "Error encountered during returnOrder"))?;

        if result.response_type != taxcloud_core::wire::ResponseType::Ok {
            warn!(
                target: "taxcloud",
                detail = result.first_message().unwrap_or_default(),
                "Error encountered during returnOrder"
            );
            return Err(ClientError::rejected("Returned", result.first_message()));
        }

        Ok(())
    }

    // =========================================================================
    // Address Verification
    // =========================================================================

    /// Asks the service for the normalized form of `address`.
    ///
    /// Returns `None` when the service cannot verify it.
    pub async fn verify_address(&self, address: &WireAddress) -> ClientResult<Option<VerifiedAddress>> {
        info!(target: "taxcloud", "Calling verifyAddress");

        let request = VerifyAddressRequest::new(self.credentials.clone(), address);
        let key = cache_key(ADDRESS_PREFIX, &request)?;
        if let Some(cached) = self.cached::<VerifiedAddress>(&key).await {
            info!(target: "taxcloud", "Using Cache");
            return Ok(Some(cached));
        }

        let result = self
            .call::<VerifyAddressResult>(Operation::VerifyAddress, &request)
            .await?;

        if !result.is_verified() {
            info!(
                target: "taxcloud",
                err_number = result.err_number,
                description = result.err_description.as_deref().unwrap_or_default(),
                "Error encountered during verifyAddress"
            );
            return Ok(None);
        }

        let verified = result.into_address();
        self.store(&key, &verified).await;
        Ok(Some(verified))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn customer_id(&self, customer: &Customer) -> String {
        customer
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.guest_customer_id.clone())
    }

    async fn call<R: DeserializeOwned>(&self, operation: Operation, request: &impl Serialize) -> ClientResult<R> {
        let body = serde_json::to_value(request)?;
        let raw = with_retry(&self.retry, operation.name(), || self.transport.post(operation, &body)).await?;
        debug!(target: "taxcloud", response = %raw, "{} RESPONSE", operation);

        let inner = unwrap_envelope(raw, operation.result_envelope());
        serde_json::from_value(inner).map_err(|e| ClientError::InvalidResponse {
            endpoint: operation.name().to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads a cached value. Misses, disabled caching and cache failures all
    /// return `None`.
    async fn cached<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.cache_lifetime?;
        match self.cache.get(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .inspect_err(|e| warn!(target: "taxcloud", error = %e, "Discarding unreadable cache entry"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(target: "taxcloud", error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn store(&self, key: &str, value: &impl Serialize) {
        let Some(lifetime) = self.cache_lifetime else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(target: "taxcloud", error = %e, "Could not serialize cache entry");
                return;
            }
        };
        info!(target: "taxcloud", lifetime_secs = lifetime.as_secs(), "Caching result");
        if let Err(e) = self.cache.set(key, raw, lifetime).await {
            warn!(target: "taxcloud", error = %e, "Cache write failed");
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the api, collector and observer tests.

    use super::*;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use taxcloud_core::money::Money;
    use taxcloud_core::types::{Address, LineItem, LineTax, ProductRef, ShippingLine};

    /// Replays queued answers and records every request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        answers: Mutex<VecDeque<ClientResult<Value>>>,
        pub requests: Mutex<Vec<(Operation, Value)>>,
    }

    impl ScriptedTransport {
        pub fn new(answers: Vec<ClientResult<Value>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn request(&self, n: usize) -> (Operation, Value) {
            self.requests.lock().unwrap()[n].clone()
        }
    }

    impl TaxTransport for Arc<ScriptedTransport> {
        async fn post(&self, operation: Operation, body: &Value) -> ClientResult<Value> {
            self.requests.lock().unwrap().push((operation, body.clone()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::ConnectionFailed("no scripted answer".into())))
        }
    }

    pub fn config() -> TaxCloudConfig {
        let mut config = TaxCloudConfig::default();
        config.settings.enabled = true;
        config.settings.api_id = "LOGIN".into();
        config.settings.api_key = "KEY".into();
        config.settings.cache_lifetime_secs = 3600;
        config.service.retry_delay_ms = 1;
        config.origin = Address {
            street: vec!["100 Warehouse Rd".into()],
            city: Some("Northfield".into()),
            region: Some("MN".into()),
            postcode: Some("55057".into()),
            country_id: Some("US".into()),
        };
        config
    }

    pub fn catalog() -> Arc<dyn TicSource + Send + Sync> {
        let mut map = std::collections::HashMap::new();
        map.insert("p-1".to_string(), "20010".to_string());
        Arc::new(map)
    }

    pub fn line(code: &str, product: Option<&str>, tax_class_id: u32, unit_cents: i64, qty: i64) -> LineItem {
        LineItem {
            code: code.into(),
            sku: format!("SKU-{code}"),
            product: product.map(|id| ProductRef { id: Some(id.into()) }),
            tax_class_id,
            unit_price: Money::from_cents(unit_cents),
            qty,
            discount: Money::zero(),
            row_total: Money::from_cents(unit_cents * qty),
            tax: LineTax::default(),
        }
    }

    pub fn assignment() -> ShippingAssignment {
        ShippingAssignment {
            address: Some(Address {
                street: vec!["1 Main St".into()],
                city: Some("Minneapolis".into()),
                region: Some("MN".into()),
                postcode: Some("55401-1234".into()),
                country_id: Some("US".into()),
            }),
            items: vec![line("item-1", Some("p-1"), 2, 1000, 1), line("item-2", Some("p-2"), 2, 2000, 2)],
            shipping: Some(ShippingLine {
                row_total: Money::from_cents(500),
                tax: LineTax::default(),
            }),
        }
    }

    pub fn quote() -> Quote {
        Quote {
            id: "42".into(),
            customer: Customer::default(),
        }
    }

    pub fn lookup_ok() -> Value {
        serde_json::json!({
            "LookupResult": {
                "ResponseType": "OK",
                "CartItemsResponse": {"CartItemResponse": [
                    {"CartItemIndex": 0, "TaxAmount": 0.5},
                    {"CartItemIndex": 1, "TaxAmount": 2.75},
                    {"CartItemIndex": 2, "TaxAmount": 0.25}
                ]}
            }
        })
    }
}
