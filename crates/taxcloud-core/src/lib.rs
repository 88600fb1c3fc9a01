//! # taxcloud-core: Pure Tax Domain Logic
//!
//! This crate holds everything the TaxCloud checkout integration can compute
//! without touching the network: ZIP code parsing, TIC resolution, the wire
//! payload types, cart item response normalization and the rate-table
//! fallback calculator.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   TaxCloud Integration Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host checkout pipeline                          │   │
//! │  │   collect totals ──► place order ──► pay/ship ──► refund        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      taxcloud-client (collector, observer, Api, cache)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ taxcloud-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌──────────┐  ┌──────────────┐     │   │
//! │  │   │ postal  │  │   tic   │  │ response │  │    wire      │     │   │
//! │  │   │ Zip5/4  │  │ default │  │ normalize│  │ request/resp │     │   │
//! │  │   └─────────┘  └─────────┘  └──────────┘  └──────────────┘     │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌──────────┐  ┌──────────────┐     │   │
//! │  │   │  money  │  │  types  │  │ fallback │  │  validation  │     │   │
//! │  │   └─────────┘  └─────────┘  └──────────┘  └──────────────┘     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO CACHE • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`postal`] - US ZIP / ZIP+4 parsing and validation
//! - [`tic`] - Taxability Information Code resolution
//! - [`response`] - Cart item response normalization and result folding
//! - [`wire`] - Request and response payloads of the remote tax service
//! - [`money`] - Money type with integer arithmetic
//! - [`types`] - Quote, order and credit memo types the host fills in
//! - [`fallback`] - Local rate-table tax used when the remote service fails
//! - [`validation`] - Destination address preconditions
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use taxcloud_core::postal;
//!
//! let parsed = postal::parse(Some("55057+1616"));
//! assert_eq!(parsed.zip5.as_deref(), Some("55057"));
//! assert_eq!(parsed.zip4.as_deref(), Some("1616"));
//! assert!(postal::is_valid(&parsed));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod fallback;
pub mod money;
pub mod postal;
pub mod response;
pub mod tic;
pub mod types;
pub mod validation;
pub mod wire;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use fallback::{FallbackCalculator, RateTableCalculator};
pub use money::Money;
pub use postal::ParsedPostalCode;
pub use response::{CartItemTax, TaxLookupResult};
pub use tic::{Tic, TicResolver, TicSource};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// The only destination country the remote service computes tax for.
pub const SUPPORTED_COUNTRY: &str = "US";

/// `ItemID` of the cart line that carries shipping charges.
pub const SHIPPING_ITEM_ID: &str = "shipping";

/// Tax class id the host uses for "None". Lines in this class are never sent.
pub const TAX_CLASS_NONE: u32 = 0;
