use fieldops_core::TenantId;
use fieldops_domain::{WebhookEvent, WebhookTopic};
use serde_json::Value;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use super::*;

/// Handle of a fan-out started by [`WebhookService::trigger`].
///
/// Dropping `outcomes` detaches the dispatch; it keeps running.
#[derive(Debug)]
pub struct TriggeredDispatch {
    /// Idempotency key carried by every delivery of this dispatch.
    pub event_id: String,
    /// Per-subscription outcomes once every branch finished.
    pub outcomes: JoinHandle<Vec<WebhookDispatchOutcome>>,
}

impl WebhookService {
    /// Starts a dispatch in the background and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(
        &self,
        tenant_id: TenantId,
        topic: WebhookTopic,
        data: Value,
        event_id: Option<String>,
    ) -> TriggeredDispatch {
        let event = WebhookEvent::new(tenant_id, topic, data, event_id);
        let event_id = event.id().to_owned();
        let service = self.clone();
        let outcomes = tokio::spawn(async move { service.fan_out(topic, event).await });

        TriggeredDispatch { event_id, outcomes }
    }

    /// Delivers one event to every matching subscription and waits for all
    /// branches.
    pub async fn dispatch_event(
        &self,
        tenant_id: TenantId,
        topic: WebhookTopic,
        data: Value,
        event_id: Option<String>,
    ) -> Vec<WebhookDispatchOutcome> {
        let event = WebhookEvent::new(tenant_id, topic, data, event_id);
        self.fan_out(topic, event).await
    }

    async fn fan_out(&self, topic: WebhookTopic, event: WebhookEvent) -> Vec<WebhookDispatchOutcome> {
        let tenant_id = event.tenant_id();
        let subscriptions = match self
            .subscription_repository
            .list_matching_subscriptions(tenant_id, topic)
            .await
        {
            Ok(subscriptions) => subscriptions,
            Err(error) => {
                error!(
                    %tenant_id,
                    event_id = event.id(),
                    topic = topic.as_str(),
                    %error,
                    "failed to resolve webhook subscriptions"
                );
                return Vec::new();
            }
        };

        let subscriptions: Vec<_> = subscriptions
            .into_iter()
            .filter(|subscription| {
                subscription.tenant_id() == tenant_id
                    && subscription.is_enabled()
                    && subscription.is_subscribed_to(topic)
            })
            .collect();

        if subscriptions.is_empty() {
            debug!(%tenant_id, topic = topic.as_str(), "no webhook subscriptions match event");
            return Vec::new();
        }

        info!(
            %tenant_id,
            event_id = event.id(),
            topic = topic.as_str(),
            subscriptions = subscriptions.len(),
            "dispatching webhook event"
        );

        let mut branches = JoinSet::new();
        for subscription in subscriptions {
            let service = self.clone();
            let event = event.clone();
            branches.spawn(async move { service.deliver(&subscription, &event).await });
        }

        let mut outcomes = Vec::with_capacity(branches.len());
        while let Some(joined) = branches.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    error!(%tenant_id, event_id = event.id(), %error, "webhook delivery task failed");
                }
            }
        }

        outcomes
    }
}
