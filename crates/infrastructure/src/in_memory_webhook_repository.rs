use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldops_application::{
    DeliveryAttemptQuery, WebhookDeliveryLog, WebhookHealthUpdate, WebhookSubscriptionRepository,
};
use fieldops_core::{AppError, AppResult, SubscriptionId, TenantId};
use fieldops_domain::{WebhookDeliveryAttempt, WebhookSubscription, WebhookTopic};
use tokio::sync::RwLock;

/// In-memory webhook subscription store and delivery log.
#[derive(Debug, Default)]
pub struct InMemoryWebhookRepository {
    subscriptions: RwLock<HashMap<(TenantId, SubscriptionId), WebhookSubscription>>,
    attempts: RwLock<Vec<WebhookDeliveryAttempt>>,
}

impl InMemoryWebhookRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one subscription.
    pub async fn insert_subscription(&self, subscription: WebhookSubscription) {
        self.subscriptions
            .write()
            .await
            .insert((subscription.tenant_id(), subscription.id()), subscription);
    }
}

fn not_found(tenant_id: TenantId, subscription_id: SubscriptionId) -> AppError {
    AppError::NotFound(format!(
        "webhook subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
    ))
}

#[async_trait]
impl WebhookSubscriptionRepository for InMemoryWebhookRepository {
    async fn list_matching_subscriptions(
        &self,
        tenant_id: TenantId,
        topic: WebhookTopic,
    ) -> AppResult<Vec<WebhookSubscription>> {
        let subscriptions = self.subscriptions.read().await;

        let mut values: Vec<WebhookSubscription> = subscriptions
            .iter()
            .filter_map(|((stored_tenant_id, _), subscription)| {
                (stored_tenant_id == &tenant_id
                    && subscription.is_enabled()
                    && subscription.is_subscribed_to(topic))
                .then(|| subscription.clone())
            })
            .collect();
        values.sort_by_key(|subscription| subscription.id().as_uuid());

        Ok(values)
    }

    async fn find_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<WebhookSubscription>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .get(&(tenant_id, subscription_id))
            .cloned())
    }

    async fn record_dispatch_success(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        triggered_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(&(tenant_id, subscription_id))
            .ok_or_else(|| not_found(tenant_id, subscription_id))?;

        subscription.mark_dispatch_succeeded(triggered_at);
        Ok(())
    }

    async fn record_dispatch_exhausted(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        disable_threshold: u32,
    ) -> AppResult<WebhookHealthUpdate> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(&(tenant_id, subscription_id))
            .ok_or_else(|| not_found(tenant_id, subscription_id))?;

        subscription.mark_dispatch_exhausted(disable_threshold);
        Ok(WebhookHealthUpdate {
            failure_count: subscription.failure_count(),
            is_enabled: subscription.is_enabled(),
        })
    }
}

#[async_trait]
impl WebhookDeliveryLog for InMemoryWebhookRepository {
    async fn append_attempt(&self, attempt: WebhookDeliveryAttempt) -> AppResult<()> {
        self.attempts.write().await.push(attempt);
        Ok(())
    }

    async fn list_attempts(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        query: DeliveryAttemptQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        let query = query.normalized();
        let attempts = self.attempts.read().await;

        let mut values: Vec<&WebhookDeliveryAttempt> = attempts
            .iter()
            .filter(|attempt| {
                attempt.tenant_id == tenant_id && attempt.subscription_id == subscription_id
            })
            .collect();
        // Newest first; equal timestamps keep reverse insertion order.
        values.sort_by_key(|attempt| attempt.timestamp);
        values.reverse();

        Ok(values
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}
