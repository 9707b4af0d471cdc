mod delivery_log;
mod repository;
mod secrets;
mod transport;

pub use delivery_log::{DeliveryAttemptQuery, WebhookDeliveryLog};
pub use repository::{WebhookHealthUpdate, WebhookSubscriptionRepository};
pub use secrets::SecretEncryptor;
pub use transport::{WebhookDeliveryError, WebhookRequest, WebhookResponse, WebhookTransport};
