//! # Order Lifecycle Observer
//!
//! Commits orders to TaxCloud when the configured capture trigger fires and
//! reports refunds.
//!
//! ```text
//! OrderEvent::Placed       ──┐
//! OrderEvent::InvoicePaid  ──┼──► trigger matches? ──► authorize_capture
//! OrderEvent::Shipped      ──┘
//!
//! refund (credit memo)    ────────────────────────► return_order
//! ```
//!
//! The host's order flow must never fail because of the tax service, so
//! every error ends here as a log line.

use std::sync::Arc;
use tracing::{debug, error, info};

use taxcloud_core::types::{CaptureTrigger, CreditMemo, Order, OrderEvent};

use crate::api::{CaptureOutcome, TaxCloudApi};
use crate::cache::ResponseCache;
use crate::config::TaxCloudConfig;
use crate::transport::TaxTransport;

/// What the observer did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverAction {
    /// Integration disabled or the event is not the capture trigger.
    Skipped,
    Captured(CaptureOutcome),
    Returned,
    /// The call failed; the error was logged.
    Failed,
}

pub struct OrderLifecycleObserver<T, C> {
    api: Arc<TaxCloudApi<T, C>>,
    enabled: bool,
    trigger: CaptureTrigger,
}

impl<T: TaxTransport, C: ResponseCache> OrderLifecycleObserver<T, C> {
    pub fn new(config: &TaxCloudConfig, api: Arc<TaxCloudApi<T, C>>) -> Self {
        Self {
            api,
            enabled: config.is_enabled(),
            trigger: config.settings.capture_trigger,
        }
    }

    pub fn trigger(&self) -> CaptureTrigger {
        self.trigger
    }

    /// Handles an order lifecycle event.
    pub async fn on_event(&self, event: OrderEvent, order: &Order) -> ObserverAction {
        if !self.enabled {
            return ObserverAction::Skipped;
        }
        if !self.trigger.matches(event) {
            debug!(target: "taxcloud", ?event, trigger = %self.trigger, "Event is not the capture trigger");
            return ObserverAction::Skipped;
        }

        info!(target: "taxcloud", order_id = %order.increment_id, ?event, "Capturing order");
        match self.api.authorize_capture(order).await {
            Ok(outcome) => ObserverAction::Captured(outcome),
            Err(e) => {
                error!(target: "taxcloud", order_id = %order.increment_id, error = %e, "Order capture failed");
                ObserverAction::Failed
            }
        }
    }

    /// Handles a refund.
    pub async fn on_refund(&self, credit_memo: &CreditMemo) -> ObserverAction {
        if !self.enabled {
            return ObserverAction::Skipped;
        }

        match self.api.return_order(credit_memo).await {
            Ok(()) => ObserverAction::Returned,
            Err(e) => {
                error!(
                    target: "taxcloud",
                    order_id = %credit_memo.order.increment_id,
                    error = %e,
                    "Order return failed"
                );
                ObserverAction::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::*;
    use crate::cache::MemoryCache;
    use crate::error::ClientError;
    use crate::transport::Operation;
    use serde_json::json;

    fn observer(config: &TaxCloudConfig, transport: &Arc<ScriptedTransport>) -> OrderLifecycleObserver<Arc<ScriptedTransport>, MemoryCache> {
        let api = TaxCloudApi::new(config, Arc::clone(transport), MemoryCache::new(), catalog());
        OrderLifecycleObserver::new(config, Arc::new(api))
    }

    fn ok() -> serde_json::Value {
        json!({"ResponseType": "OK"})
    }

    #[tokio::test]
    async fn test_default_trigger_captures_on_placement() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok())]));
        let observer = observer(&config(), &transport);
        assert_eq!(observer.trigger(), CaptureTrigger::OrderCreation);

        let action = observer.on_event(OrderEvent::Placed, &Order::default()).await;

        assert_eq!(action, ObserverAction::Captured(CaptureOutcome::Captured));
        assert_eq!(transport.request(0).0, Operation::AuthorizedWithCapture);
    }

    #[tokio::test]
    async fn test_other_events_are_skipped() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let observer = observer(&config(), &transport);

        assert_eq!(observer.on_event(OrderEvent::InvoicePaid, &Order::default()).await, ObserverAction::Skipped);
        assert_eq!(observer.on_event(OrderEvent::Shipped, &Order::default()).await, ObserverAction::Skipped);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_shipment_trigger() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok())]));
        let mut config = config();
        config.settings.capture_trigger = CaptureTrigger::Shipment;
        let observer = observer(&config, &transport);

        assert_eq!(observer.on_event(OrderEvent::Placed, &Order::default()).await, ObserverAction::Skipped);
        assert_eq!(
            observer.on_event(OrderEvent::Shipped, &Order::default()).await,
            ObserverAction::Captured(CaptureOutcome::Captured)
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_integration_does_nothing() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let mut config = config();
        config.settings.enabled = false;
        let observer = observer(&config, &transport);

        assert_eq!(observer.on_event(OrderEvent::Placed, &Order::default()).await, ObserverAction::Skipped);
        assert_eq!(observer.on_refund(&CreditMemo::default()).await, ObserverAction::Skipped);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_capture_failure_is_contained() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(ClientError::ConnectionFailed("reset".into())),
            Err(ClientError::ConnectionFailed("reset".into())),
        ]));
        let observer = observer(&config(), &transport);

        let action = observer.on_event(OrderEvent::Placed, &Order::default()).await;
        assert_eq!(action, ObserverAction::Failed);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_refund_reports_return() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(ok())]));
        let observer = observer(&config(), &transport);

        assert_eq!(observer.on_refund(&CreditMemo::default()).await, ObserverAction::Returned);
        assert_eq!(transport.request(0).0, Operation::Returned);
    }
}
