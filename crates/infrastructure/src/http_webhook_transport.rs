use std::time::Duration;

use async_trait::async_trait;
use fieldops_application::{
    WebhookDeliveryError, WebhookRequest, WebhookResponse, WebhookTransport,
};
use fieldops_core::{AppError, AppResult};
use fieldops_domain::MAX_RESPONSE_BODY_CHARS;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on body bytes read from a subscriber; enough for the audited
/// characters even when every one of them is four bytes wide.
const MAX_RESPONSE_BODY_BYTES: usize = MAX_RESPONSE_BODY_CHARS * 4;

/// reqwest-based transport for subscriber deliveries.
///
/// Redirects are never followed; a 3xx answer is reported as a failed attempt.
#[derive(Clone)]
pub struct HttpWebhookTransport {
    http_client: reqwest::Client,
}

impl HttpWebhookTransport {
    /// Creates a transport around an existing client.
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Builds the delivery client: no redirects, bounded connect time.
    pub fn build_client() -> AppResult<reqwest::Client> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build webhook HTTP client: {error}"))
            })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, WebhookDeliveryError> {
        let mut builder = self.http_client.post(request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|error| WebhookDeliveryError::Transport(error.to_string()))?;

        let status = response.status();
        let mut body = Vec::new();
        while body.len() < MAX_RESPONSE_BODY_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) | Err(_) => break,
            }
        }
        body.truncate(MAX_RESPONSE_BODY_BYTES);

        Ok(WebhookResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
