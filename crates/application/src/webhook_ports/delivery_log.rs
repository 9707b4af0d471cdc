use async_trait::async_trait;
use fieldops_core::{AppResult, SubscriptionId, TenantId};
use fieldops_domain::WebhookDeliveryAttempt;

/// Paging query for delivery attempt listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAttemptQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Rows skipped from the newest attempt.
    pub offset: usize,
}

impl DeliveryAttemptQuery {
    /// Largest page size served by the delivery log.
    pub const MAX_LIMIT: usize = 200;
    /// Page size used when the caller does not pick one.
    pub const DEFAULT_LIMIT: usize = 50;

    /// Returns the query with its limit clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, Self::MAX_LIMIT),
            offset: self.offset,
        }
    }
}

impl Default for DeliveryAttemptQuery {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Append-only audit store of delivery attempts.
#[async_trait]
pub trait WebhookDeliveryLog: Send + Sync {
    /// Appends one attempt row.
    async fn append_attempt(&self, attempt: WebhookDeliveryAttempt) -> AppResult<()>;

    /// Lists attempts of one subscription, newest first.
    async fn list_attempts(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        query: DeliveryAttemptQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>>;
}
