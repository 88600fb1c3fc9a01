//! # Wire Protocol
//!
//! Request and response payloads of the TaxCloud web service (JSON binding).
//!
//! ## Operations
//! ```text
//! ┌──────────────────────┬─────────────────────────────┬────────────────────┐
//! │ Endpoint             │ Request                     │ Result envelope    │
//! ├──────────────────────┼─────────────────────────────┼────────────────────┤
//! │ Lookup               │ LookupRequest               │ LookupResult       │
//! │ AuthorizedWithCapture│ AuthorizedWithCaptureRequest│ AuthorizedWith...  │
//! │ Returned             │ ReturnedRequest             │ ReturnedResult     │
//! │ VerifyAddress        │ VerifyAddressRequest        │ VerifyAddressResult│
//! └──────────────────────┴─────────────────────────────┴────────────────────┘
//! ```
//!
//! Field names match the service exactly (`apiLoginID`, `cartItems`,
//! `CartItemIndex`), so every struct carries explicit serde renames.
//!
//! Responses are parsed leniently: `ResponseType` may arrive as a name or as
//! its numeric code, results may or may not be wrapped in their
//! `...Result` envelope, and `Messages` may be a list or a
//! `{"ResponseMessage": ...}` object.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::money::Money;
use crate::postal::ParsedPostalCode;
use crate::types::Address;

// =============================================================================
// Shared Pieces
// =============================================================================

/// API login id and key, flattened into every request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "apiLoginID")]
    pub api_login_id: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_login_id", &self.api_login_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// An origin or destination address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAddress {
    #[serde(rename = "Address1", default)]
    pub address1: String,
    #[serde(rename = "Address2", default)]
    pub address2: String,
    #[serde(rename = "City", default)]
    pub city: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Zip5", default)]
    pub zip5: String,
    #[serde(rename = "Zip4", default)]
    pub zip4: String,
}

impl WireAddress {
    /// Builds the wire form of a host address with an already parsed postcode.
    pub fn from_address(address: &Address, postcode: &ParsedPostalCode) -> Self {
        Self {
            address1: address.street_line(0).to_string(),
            address2: address.street_line(1).to_string(),
            city: address.city.clone().unwrap_or_default(),
            state: address.region.clone().unwrap_or_default(),
            zip5: postcode.zip5.clone().unwrap_or_default(),
            zip4: postcode.zip4.clone().unwrap_or_default(),
        }
    }
}

/// One line of `cartItems`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "ItemID")]
    pub item_id: String,
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "TIC")]
    pub tic: String,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Qty")]
    pub qty: i64,
}

impl CartItem {
    pub fn new(item_id: impl Into<String>, index: usize, tic: impl Into<String>, price: Money, qty: i64) -> Self {
        Self {
            item_id: item_id.into(),
            index,
            tic: tic.into(),
            price: price.to_wire_amount(),
            qty,
        }
    }

    pub fn is_shipping(&self) -> bool {
        self.item_id == crate::SHIPPING_ITEM_ID
    }
}

/// Exemption certificate reference. `CertificateID` is always sent, `null`
/// when the customer has none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptCert {
    #[serde(rename = "CertificateID")]
    pub certificate_id: Option<String>,
}

// =============================================================================
// Requests
// =============================================================================

/// Body of the `Lookup` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    #[serde(rename = "cartID")]
    pub cart_id: String,
    #[serde(rename = "cartItems")]
    pub cart_items: Vec<CartItem>,
    pub origin: WireAddress,
    pub destination: WireAddress,
    #[serde(rename = "deliveredBySeller")]
    pub delivered_by_seller: bool,
    #[serde(rename = "exemptCert")]
    pub exempt_cert: ExemptCert,
}

/// Body of the `AuthorizedWithCapture` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedWithCaptureRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    #[serde(rename = "cartID")]
    pub cart_id: String,
    #[serde(rename = "orderID")]
    pub order_id: String,
    /// RFC 3339 timestamp.
    #[serde(rename = "dateAuthorized")]
    pub date_authorized: String,
    /// RFC 3339 timestamp.
    #[serde(rename = "dateCaptured")]
    pub date_captured: String,
}

/// Body of the `Returned` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnedRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "cartItems")]
    pub cart_items: Vec<CartItem>,
    #[serde(rename = "returnedDate")]
    pub returned_date: String,
    #[serde(rename = "returnCoDeliveryFeeWhenNoCartItems")]
    pub return_co_delivery_fee_when_no_cart_items: bool,
}

/// Body of the `VerifyAddress` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyAddressRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip5: String,
    pub zip4: String,
}

impl VerifyAddressRequest {
    pub fn new(credentials: Credentials, address: &WireAddress) -> Self {
        Self {
            credentials,
            address1: address.address1.clone(),
            address2: address.address2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zip5: address.zip5.clone(),
            zip4: address.zip4.clone(),
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Outcome category of a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponseType {
    Error,
    Warning,
    Informational,
    #[serde(rename = "OK")]
    Ok,
}

impl ResponseType {
    /// `OK` and `Informational` both carry usable results.
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseType::Ok | ResponseType::Informational)
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ResponseType::Error),
            1 => Some(ResponseType::Warning),
            2 => Some(ResponseType::Informational),
            3 => Some(ResponseType::Ok),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Error" => Some(ResponseType::Error),
            "Warning" => Some(ResponseType::Warning),
            "Informational" => Some(ResponseType::Informational),
            "OK" => Some(ResponseType::Ok),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ResponseType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let parsed = match &value {
            Value::String(s) => ResponseType::from_name(s),
            Value::Number(n) => n.as_i64().and_then(ResponseType::from_code),
            _ => None,
        };
        parsed.ok_or_else(|| serde::de::Error::custom(format!("unknown ResponseType {value}")))
    }
}

/// Result of `Lookup`, `AuthorizedWithCapture` and `Returned`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceResult {
    #[serde(rename = "ResponseType")]
    pub response_type: ResponseType,
    #[serde(rename = "Messages", default)]
    pub messages: Value,
    /// Raw cart item response, normalized by [`crate::response`].
    #[serde(rename = "CartItemsResponse", default)]
    pub cart_items_response: Value,
}

impl ServiceResult {
    /// Text of the first response message, if any.
    pub fn first_message(&self) -> Option<&str> {
        let messages = match &self.messages {
            Value::Object(map) => map.get("ResponseMessage").unwrap_or(&self.messages),
            other => other,
        };
        let first = match messages {
            Value::Array(list) => list.first()?,
            other => other,
        };
        first.get("Message").and_then(Value::as_str)
    }
}

/// Result of `VerifyAddress`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyAddressResult {
    #[serde(rename = "Address1", default)]
    pub address1: Option<String>,
    #[serde(rename = "Address2", default)]
    pub address2: Option<String>,
    #[serde(rename = "City", default)]
    pub city: Option<String>,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "Zip5", default)]
    pub zip5: Option<String>,
    #[serde(rename = "Zip4", default)]
    pub zip4: Option<String>,
    /// `0` on success. The service sends it as a string.
    #[serde(rename = "ErrNumber", default, deserialize_with = "lenient_i64")]
    pub err_number: i64,
    #[serde(rename = "ErrDescription", default)]
    pub err_description: Option<String>,
}

impl VerifyAddressResult {
    pub fn is_verified(&self) -> bool {
        self.err_number == 0
    }

    /// The corrected address.
    pub fn into_address(self) -> WireAddress {
        WireAddress {
            address1: self.address1.unwrap_or_default(),
            address2: self.address2.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            zip5: self.zip5.unwrap_or_default(),
            zip4: self.zip4.unwrap_or_default(),
        }
    }
}

/// Strips the `{"<name>": {...}}` envelope when the service sends one.
pub fn unwrap_envelope(value: Value, name: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(name) => map.remove(name).unwrap_or(Value::Null),
        other => other,
    }
}

/// Accepts a number, a numeric string, or null (as 0).
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("ErrNumber out of range: {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("ErrNumber is not numeric: {s:?}"))),
        other => Err(serde::de::Error::custom(format!("unexpected ErrNumber {other}"))),
    }
}
