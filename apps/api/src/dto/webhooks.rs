use chrono::SecondsFormat;
use fieldops_application::{DeliveryAttemptQuery, WebhookTestResult};
use fieldops_domain::WebhookDeliveryAttempt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Incoming domain event forwarded by an out-of-process service.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/trigger-webhook-event-request.ts"
)]
pub struct TriggerWebhookEventRequest {
    pub topic: String,
    #[serde(default)]
    #[ts(type = "unknown")]
    pub data: Value,
    pub event_id: Option<String>,
}

/// Acknowledgement of an accepted event.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/trigger-webhook-event-response.ts"
)]
pub struct TriggerWebhookEventResponse {
    pub event_id: String,
}

/// Result of a diagnostic delivery.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/webhook-test-response.ts"
)]
pub struct WebhookTestResponse {
    pub success: bool,
    pub http_status: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    #[ts(type = "number")]
    pub processing_time_ms: u64,
}

impl From<WebhookTestResult> for WebhookTestResponse {
    fn from(value: WebhookTestResult) -> Self {
        Self {
            success: value.success,
            http_status: value.http_status,
            response_body: value.response_body,
            error_message: value.error_message,
            processing_time_ms: value.processing_time_ms,
        }
    }
}

/// Paging parameters of the delivery attempt listing.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/delivery-attempt-list-query.ts"
)]
pub struct DeliveryAttemptListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<DeliveryAttemptListQuery> for DeliveryAttemptQuery {
    fn from(value: DeliveryAttemptListQuery) -> Self {
        let defaults = Self::default();
        Self {
            limit: value.limit.unwrap_or(defaults.limit),
            offset: value.offset.unwrap_or(defaults.offset),
        }
    }
}

/// API representation of one audited delivery attempt.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/webhook-delivery-attempt-response.ts"
)]
pub struct WebhookDeliveryAttemptResponse {
    pub id: String,
    pub subscription_id: String,
    pub topic: String,
    #[ts(type = "unknown")]
    pub payload: Value,
    pub delivery_url: String,
    pub http_status: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub attempt: u32,
    pub success: bool,
    pub is_test: bool,
    #[ts(type = "number")]
    pub processing_time_ms: u64,
    pub timestamp: String,
}

impl From<WebhookDeliveryAttempt> for WebhookDeliveryAttemptResponse {
    fn from(value: WebhookDeliveryAttempt) -> Self {
        Self {
            id: value.id.to_string(),
            subscription_id: value.subscription_id.to_string(),
            topic: value.topic,
            payload: value.payload,
            delivery_url: value.delivery_url,
            http_status: value.http_status,
            response_body: value.response_body,
            error_message: value.error_message,
            attempt: value.attempt,
            success: value.success,
            is_test: value.is_test,
            processing_time_ms: value.processing_time_ms,
            timestamp: value.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
