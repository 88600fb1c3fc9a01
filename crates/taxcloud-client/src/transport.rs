//! # HTTP Transport
//!
//! Posts JSON bodies to the TaxCloud endpoints.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  TaxCloudApi ──► TaxTransport::post(Operation::Lookup, body)           │
//! │                        │                                                │
//! │                        ▼                                                │
//! │            POST {base_url}/Lookup   (Content-Type: application/json)   │
//! │                        │                                                │
//! │          ┌─────────────┴──────────────┐                                 │
//! │          ▼                            ▼                                 │
//! │     2xx + JSON body             timeout / connect / 5xx                 │
//! │     → Ok(Value)                 → Err(ClientError), retried once        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transport knows nothing about `ResponseType`; a well-formed answer
//! that rejects the call is still `Ok` here.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ServiceSettings;
use crate::error::{ClientError, ClientResult};

// =============================================================================
// Operations
// =============================================================================

/// Remote operations of the tax service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Lookup,
    AuthorizedWithCapture,
    Returned,
    VerifyAddress,
}

impl Operation {
    /// Endpoint name appended to the base URL.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Lookup => "Lookup",
            Operation::AuthorizedWithCapture => "AuthorizedWithCapture",
            Operation::Returned => "Returned",
            Operation::VerifyAddress => "VerifyAddress",
        }
    }

    /// Key of the envelope the result may be wrapped in.
    pub fn result_envelope(&self) -> &'static str {
        match self {
            Operation::Lookup => "LookupResult",
            Operation::AuthorizedWithCapture => "AuthorizedWithCaptureResult",
            Operation::Returned => "ReturnedResult",
            Operation::VerifyAddress => "VerifyAddressResult",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Transport Seam
// =============================================================================

/// Sends one request to the tax service and returns the decoded JSON body.
pub trait TaxTransport: Send + Sync {
    fn post(&self, operation: Operation, body: &Value) -> impl Future<Output = ClientResult<Value>> + Send;
}

// =============================================================================
// reqwest Implementation
// =============================================================================

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport for the configured endpoint.
    pub fn new(settings: &ServiceSettings) -> ClientResult<Self> {
        let base_url = Url::parse(settings.base_url.trim_end_matches('/'))?;
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout: settings.timeout(),
        })
    }

    /// Full URL of an operation.
    pub fn endpoint(&self, operation: Operation) -> ClientResult<Url> {
        let joined = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), operation.name());
        Ok(Url::parse(&joined)?)
    }
}

impl TaxTransport for HttpTransport {
    async fn post(&self, operation: Operation, body: &Value) -> ClientResult<Value> {
        let url = self.endpoint(operation)?;
        debug!(target: "taxcloud", %url, timeout = ?self.timeout, "Calling {} LIVE API", operation);

        let response = self.client.post(url).json(body).send().await?;
        let response = response.error_for_status()?;
        let value = response.json::<Value>().await?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Lookup.to_string(), "Lookup");
        assert_eq!(Operation::Returned.result_envelope(), "ReturnedResult");
        assert_eq!(
            Operation::AuthorizedWithCapture.result_envelope(),
            "AuthorizedWithCaptureResult"
        );
    }

    #[test]
    fn test_endpoint_join() {
        let mut settings = ServiceSettings::default();
        settings.base_url = "https://api.taxcloud.net/1.0/TaxCloud/".into();
        let transport = HttpTransport::new(&settings).unwrap();

        assert_eq!(
            transport.endpoint(Operation::Lookup).unwrap().as_str(),
            "https://api.taxcloud.net/1.0/TaxCloud/Lookup"
        );
        assert_eq!(
            transport.endpoint(Operation::VerifyAddress).unwrap().as_str(),
            "https://api.taxcloud.net/1.0/TaxCloud/VerifyAddress"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let mut settings = ServiceSettings::default();
        settings.base_url = "not a url".into();
        assert!(HttpTransport::new(&settings).unwrap_err().is_config_error());
    }
}
