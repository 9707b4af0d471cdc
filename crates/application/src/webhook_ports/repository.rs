use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldops_core::{AppResult, SubscriptionId, TenantId};
use fieldops_domain::{WebhookSubscription, WebhookTopic};

/// Health fields returned after an exhausted dispatch was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookHealthUpdate {
    /// Consecutive exhausted dispatches after the increment.
    pub failure_count: u32,
    /// Enabled flag after the threshold check.
    pub is_enabled: bool,
}

/// Repository port for subscriber records and their health fields.
#[async_trait]
pub trait WebhookSubscriptionRepository: Send + Sync {
    /// Lists enabled subscriptions of a tenant that listen to a topic.
    async fn list_matching_subscriptions(
        &self,
        tenant_id: TenantId,
        topic: WebhookTopic,
    ) -> AppResult<Vec<WebhookSubscription>>;

    /// Returns one subscription regardless of its enabled flag.
    async fn find_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<WebhookSubscription>>;

    /// Resets the failure streak and stamps the last successful dispatch.
    async fn record_dispatch_success(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        triggered_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Increments the failure streak by one and disables the subscription
    /// when the streak reaches `disable_threshold`, as one atomic update.
    async fn record_dispatch_exhausted(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        disable_threshold: u32,
    ) -> AppResult<WebhookHealthUpdate>;
}
