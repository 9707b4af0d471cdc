use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Failure classes of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookDeliveryError {
    /// Connection refused, DNS failure or another network error.
    #[error("{0}")]
    Transport(String),

    /// The subscriber did not answer within the subscription timeout.
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout bound that expired.
        timeout_ms: u32,
    },

    /// The subscriber answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    Protocol {
        /// Response status code.
        status: u16,
        /// Canonical reason phrase.
        status_text: String,
    },

    /// The subscription cannot be delivered as configured.
    #[error("{0}")]
    Configuration(String),
}

impl WebhookDeliveryError {
    /// Returns whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

/// One signed POST handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    /// Target URL.
    pub url: Url,
    /// Header pairs in send order.
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body; the signature covers exactly these bytes.
    pub body: Vec<u8>,
}

impl WebhookRequest {
    /// Returns the first header value matching `name` case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header_name, _)| header_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Subscriber answer, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    /// Response status code.
    pub status: u16,
    /// Canonical reason phrase for the status.
    pub status_text: String,
    /// Response body, empty when it could not be read.
    pub body: String,
}

impl WebhookResponse {
    /// Returns whether the status is in `[200, 300)`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP port used for subscriber deliveries.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Sends one request. Non-2xx answers are returned as responses;
    /// only failures to obtain a response are errors.
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, WebhookDeliveryError>;
}
