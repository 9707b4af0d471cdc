mod common;
mod webhooks;

pub use common::{HealthDependencyStatus, HealthResponse};
pub use webhooks::{
    DeliveryAttemptListQuery, TriggerWebhookEventRequest, TriggerWebhookEventResponse,
    WebhookDeliveryAttemptResponse, WebhookTestResponse,
};
