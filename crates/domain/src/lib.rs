//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod webhook_delivery;
mod webhook_subscription;
mod webhook_topic;

pub use webhook_delivery::{
    MAX_RESPONSE_BODY_CHARS, WebhookDeliveryAttempt, WebhookEvent, WebhookEventPayload,
    truncate_response_body,
};
pub use webhook_subscription::{
    DEFAULT_WEBHOOK_DISABLE_THRESHOLD, MAX_WEBHOOK_RETRIES, MAX_WEBHOOK_TIMEOUT_MS,
    MIN_WEBHOOK_TIMEOUT_MS, RESERVED_WEBHOOK_HEADERS, WEBHOOK_ATTEMPT_HEADER,
    WEBHOOK_DELIVERY_ID_HEADER, WEBHOOK_SIGNATURE_HEADER, WEBHOOK_SUBSCRIPTION_ID_HEADER,
    WEBHOOK_TOPIC_HEADER, WebhookHealth, WebhookSecret, WebhookSubscription,
    WebhookSubscriptionInput, is_reserved_webhook_header,
};
pub use webhook_topic::{WEBHOOK_PING_TOPIC, WebhookTopic};
