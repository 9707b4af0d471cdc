use std::sync::Arc;

use fieldops_core::SubscriptionId;

use crate::webhook_ports::{WebhookDeliveryLog, WebhookSubscriptionRepository, WebhookTransport};

mod config;
mod delivery;
mod diagnostics;
mod dispatch;
mod health;

pub use config::{DEFAULT_WEBHOOK_BACKOFF_BASE, DEFAULT_WEBHOOK_USER_AGENT, WebhookDeliveryConfig};
pub use diagnostics::WebhookTestResult;
pub use dispatch::TriggeredDispatch;

/// Per-subscription attempt state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDeliveryState {
    /// Run accepted, nothing sent yet.
    Pending,
    /// One attempt is in flight.
    Attempting,
    /// Waiting out the backoff before the next attempt.
    RetryWait,
    /// A 2xx answer ended the run.
    Succeeded,
    /// Every allowed attempt failed.
    Exhausted,
}

impl WebhookDeliveryState {
    /// Returns stable label used in traces.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Attempting => "attempting",
            Self::RetryWait => "retry_wait",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Result of one subscription's branch inside a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDispatchOutcome {
    /// A 2xx answer arrived on attempt `attempts`.
    Succeeded {
        /// Target subscription.
        subscription_id: SubscriptionId,
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// All attempts failed; the failure streak was incremented.
    Exhausted {
        /// Target subscription.
        subscription_id: SubscriptionId,
        /// Attempts made.
        attempts: u32,
    },
    /// Nothing was sent because the subscription is unusable as configured.
    Skipped {
        /// Target subscription.
        subscription_id: SubscriptionId,
        /// Configuration problem.
        reason: String,
    },
}

impl WebhookDispatchOutcome {
    /// Returns the subscription this outcome belongs to.
    #[must_use]
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            Self::Succeeded {
                subscription_id, ..
            }
            | Self::Exhausted {
                subscription_id, ..
            }
            | Self::Skipped {
                subscription_id, ..
            } => *subscription_id,
        }
    }
}

/// Webhook delivery engine: fan-out, signed delivery with retries,
/// health accounting and diagnostics.
#[derive(Clone)]
pub struct WebhookService {
    subscription_repository: Arc<dyn WebhookSubscriptionRepository>,
    delivery_log: Arc<dyn WebhookDeliveryLog>,
    transport: Arc<dyn WebhookTransport>,
    config: WebhookDeliveryConfig,
}

impl WebhookService {
    /// Creates a webhook service with default delivery configuration.
    #[must_use]
    pub fn new(
        subscription_repository: Arc<dyn WebhookSubscriptionRepository>,
        delivery_log: Arc<dyn WebhookDeliveryLog>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            subscription_repository,
            delivery_log,
            transport,
            config: WebhookDeliveryConfig::default(),
        }
    }

    /// Replaces the delivery configuration.
    #[must_use]
    pub fn with_delivery_config(mut self, config: WebhookDeliveryConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests;
