//! Application services and ports.

#![forbid(unsafe_code)]

mod webhook_ports;
mod webhook_service;
mod webhook_signature;

pub use webhook_ports::{
    DeliveryAttemptQuery, SecretEncryptor, WebhookDeliveryError, WebhookDeliveryLog,
    WebhookHealthUpdate, WebhookRequest, WebhookResponse, WebhookSubscriptionRepository,
    WebhookTransport,
};
pub use webhook_service::{
    DEFAULT_WEBHOOK_BACKOFF_BASE, DEFAULT_WEBHOOK_USER_AGENT, TriggeredDispatch,
    WebhookDeliveryConfig, WebhookDeliveryState, WebhookDispatchOutcome, WebhookService,
    WebhookTestResult,
};
pub use webhook_signature::{sign_webhook_payload, verify_webhook_signature};
