//! Delivery transport for telemetry batches
//!
//! A transport performs exactly one attempt to post a batch of events to the
//! collector. It never retries on its own: a failed batch is handed back to
//! the caller, which decides whether to keep it for later.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// =============================================================================
// Error Types
// =============================================================================

/// Failure to deliver a batch
///
/// The variants exist for diagnostics. Callers route every variant the same
/// way: the batch was not accepted and must be kept.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The request could not be sent or the response could not be read
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The collector answered with a non-success status
    #[error("Collector rejected batch with HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// A caller-supplied header could not be encoded
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name as supplied
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The batch could not be encoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeliveryError {
    /// HTTP status code, when the collector answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Status { status, .. } => Some(*status),
            DeliveryError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// HTTP method used to post batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    /// POST request
    Post,
    /// PUT request
    Put,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// Credentials attached to every delivery request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    /// Send no credentials beyond what the headers already carry
    Omit,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// HTTP basic authentication
    Basic {
        /// User name
        username: String,
        /// Optional password
        password: Option<String>,
    },
}

/// Request parameters supplied by the host application
///
/// Mirrors the fetch options the app already uses for its own API calls
/// (CSRF token, organization header, session cookie …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    /// HTTP method
    pub method: HttpMethod,
    /// Headers sent with every batch
    pub headers: BTreeMap<String, String>,
    /// Credentials sent with every batch
    pub credentials: Credentials,
}

impl Default for FetchParams {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("accept".to_string(), "*/*".to_string());
        headers.insert("content-type".to_string(), "application/json;charset=UTF-8".to_string());

        Self { method: HttpMethod::Post, headers, credentials: Credentials::Omit }
    }
}

impl FetchParams {
    /// Create parameters with the default JSON headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Add or replace a header (names are case-insensitive)
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    fn header_map(&self) -> Result<HeaderMap, DeliveryError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                DeliveryError::InvalidHeader { name: name.clone(), reason: e.to_string() }
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                DeliveryError::InvalidHeader { name: name.clone(), reason: e.to_string() }
            })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Sends one batch of events to a collector
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Make a single delivery attempt
    ///
    /// `Ok(())` means the collector accepted the whole batch.
    async fn send(
        &self,
        endpoint: &str,
        params: &FetchParams,
        events: &[serde_json::Value],
    ) -> Result<(), DeliveryError>;
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("mobile-telemetry/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Transport posting JSON batches over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: TransportConfig) -> Result<Self, DeliveryError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        params: &FetchParams,
        events: &[serde_json::Value],
    ) -> Result<(), DeliveryError> {
        let mut headers = params.header_map()?;
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        let body = serde_json::to_vec(events)?;

        let mut req = match params.method {
            HttpMethod::Post => self.client.post(endpoint),
            HttpMethod::Put => self.client.put(endpoint),
        }
        .headers(headers)
        .body(body);

        req = match &params.credentials {
            Credentials::Omit => req,
            Credentials::Bearer(token) => req.bearer_auth(token),
            Credentials::Basic { username, password } => {
                req.basic_auth(username, password.as_ref())
            }
        };

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status { status: status.as_u16(), body });
        }

        tracing::debug!(
            endpoint,
            method = params.method.as_str(),
            count = events.len(),
            status = status.as_u16(),
            "Delivered batch"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
