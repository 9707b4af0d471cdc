use chrono::{DateTime, Utc};
use fieldops_core::{SubscriptionId, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{WEBHOOK_PING_TOPIC, WebhookSubscription, WebhookTopic};

/// Maximum number of response body characters kept in the delivery log.
pub const MAX_RESPONSE_BODY_CHARS: usize = 10_000;

/// Truncates a subscriber response body to the audited length.
#[must_use]
pub fn truncate_response_body(body: &str) -> String {
    match body.char_indices().nth(MAX_RESPONSE_BODY_CHARS) {
        Some((cut, _)) => body[..cut].to_owned(),
        None => body.to_owned(),
    }
}

/// One domain event ready to be fanned out to matching subscriptions.
///
/// The `id` doubles as the idempotency key: every attempt against every
/// subscriber carries the same value.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    id: String,
    topic: String,
    data: Value,
    timestamp: DateTime<Utc>,
    tenant_id: TenantId,
}

impl WebhookEvent {
    /// Creates an event for a taxonomy topic, reusing a caller id when present.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        topic: WebhookTopic,
        data: Value,
        event_id: Option<String>,
    ) -> Self {
        let id = event_id
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            id,
            topic: topic.as_str().to_owned(),
            data,
            timestamp: Utc::now(),
            tenant_id,
        }
    }

    /// Creates the synthetic event sent by diagnostic deliveries.
    #[must_use]
    pub fn ping(tenant_id: TenantId, subscription_id: SubscriptionId) -> Self {
        let timestamp = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            topic: WEBHOOK_PING_TOPIC.to_owned(),
            data: serde_json::json!({
                "message": "Fieldops webhook test delivery",
                "subscriptionId": subscription_id,
                "sentAt": timestamp,
            }),
            timestamp,
            tenant_id,
        }
    }

    /// Returns the idempotency key.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the topic value.
    #[must_use]
    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    /// Returns the tenant scope.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Builds the wire payload stamped with one subscriber's api version.
    #[must_use]
    pub fn payload_for(&self, subscription: &WebhookSubscription) -> WebhookEventPayload {
        WebhookEventPayload {
            id: self.id.clone(),
            topic: self.topic.clone(),
            data: self.data.clone(),
            timestamp: self.timestamp,
            tenant_id: self.tenant_id,
            api_version: subscription.api_version().as_str().to_owned(),
        }
    }
}

/// JSON body posted to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEventPayload {
    /// Idempotency key shared by every attempt of a dispatch.
    pub id: String,
    /// Event topic.
    pub topic: String,
    /// Event data supplied by the emitting domain service.
    pub data: Value,
    /// Event creation time.
    pub timestamp: DateTime<Utc>,
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Api version of the receiving subscription.
    pub api_version: String,
}

/// Immutable audit row written for every delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookDeliveryAttempt {
    /// Attempt row identifier, also sent as the delivery id header.
    pub id: Uuid,
    /// Target subscription.
    pub subscription_id: SubscriptionId,
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Event topic.
    pub topic: String,
    /// Payload snapshot exactly as serialized for the attempt.
    pub payload: Value,
    /// Target URL at send time.
    pub delivery_url: String,
    /// HTTP status when the subscriber responded.
    pub http_status: Option<u16>,
    /// Response body truncated to [`MAX_RESPONSE_BODY_CHARS`].
    pub response_body: Option<String>,
    /// Failure description.
    pub error_message: Option<String>,
    /// 1-based attempt sequence inside its dispatch.
    pub attempt: u32,
    /// Whether the subscriber answered with a 2xx status.
    pub success: bool,
    /// Whether the attempt came from the diagnostic endpoint.
    pub is_test: bool,
    /// Wall time spent on the attempt.
    pub processing_time_ms: u64,
    /// Attempt start time.
    pub timestamp: DateTime<Utc>,
}
