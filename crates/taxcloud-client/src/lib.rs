//! # taxcloud-client: TaxCloud Service Client for the Checkout
//!
//! This crate talks to the TaxCloud web service and provides the two hooks
//! the host checkout calls: the tax totals collector and the order lifecycle
//! observer.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TaxCloud Client                                  │
//! │                                                                         │
//! │   host checkout                         host order flow                 │
//! │        │                                      │                         │
//! │        ▼                                      ▼                         │
//! │  ┌────────────────────┐             ┌────────────────────────┐          │
//! │  │ TaxTotalsCollector │             │ OrderLifecycleObserver │          │
//! │  │ writes line tax    │             │ capture trigger,       │          │
//! │  │ and totals         │             │ refunds                │          │
//! │  └─────────┬──────────┘             └───────────┬────────────┘          │
//! │            └──────────────┬─────────────────────┘                       │
//! │                           ▼                                             │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                 TaxCloudApi (orchestrator)                       │   │
//! │  │  Lookup · AuthorizedWithCapture · Returned · VerifyAddress       │   │
//! │  └───────┬──────────────────┬───────────────────────┬───────────────┘   │
//! │          ▼                  ▼                       ▼                   │
//! │  ┌──────────────┐   ┌──────────────┐   ┌────────────────────────┐       │
//! │  │ RetryPolicy  │   │ TaxTransport │   │ ResponseCache          │       │
//! │  │ 2 attempts   │   │ reqwest JSON │   │ memory / Redis         │       │
//! │  └──────────────┘   └──────────────┘   └────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - `TaxCloudApi` orchestrator
//! - [`cache`] - Response cache backends and key derivation
//! - [`collector`] - Tax totals collector
//! - [`config`] - Integration configuration (TOML + env)
//! - [`error`] - Client error types
//! - [`observer`] - Order lifecycle observer
//! - [`retry`] - Retry-once policy
//! - [`telemetry`] - Tracing subscriber setup
//! - [`transport`] - HTTP transport
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taxcloud_client::{CacheStore, HttpTransport, TaxCloudApi, TaxCloudConfig, TaxTotalsCollector};
//!
//! let config = TaxCloudConfig::load(None)?;
//! let transport = HttpTransport::new(&config.service)?;
//! let cache = CacheStore::from_settings(&config.cache).await?;
//! let api = Arc::new(TaxCloudApi::new(&config, transport, cache, catalog));
//!
//! let collector = TaxTotalsCollector::new(&config, Arc::clone(&api));
//! collector.collect(&quote, &mut assignment, &mut totals).await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod observer;
pub mod retry;
pub mod telemetry;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{CaptureOutcome, TaxCloudApi, VerifiedAddress};
pub use cache::{CacheStore, MemoryCache, RedisCache, ResponseCache};
pub use collector::TaxTotalsCollector;
pub use config::{CacheBackend, TaxCloudConfig};
pub use error::{ClientError, ClientResult};
pub use observer::{ObserverAction, OrderLifecycleObserver};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Operation, TaxTransport};
