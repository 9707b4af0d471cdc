use std::time::Duration;

use fieldops_domain::DEFAULT_WEBHOOK_DISABLE_THRESHOLD;

/// Default `User-Agent` sent with deliveries.
pub const DEFAULT_WEBHOOK_USER_AGENT: &str = "Fieldops-Webhooks/1.0";
/// Default wait before the second attempt; doubles on every further retry.
pub const DEFAULT_WEBHOOK_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Engine-wide delivery tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDeliveryConfig {
    disable_threshold: u32,
    backoff_base: Duration,
    user_agent: String,
}

impl WebhookDeliveryConfig {
    /// Creates a configuration. A zero threshold is raised to one and a
    /// blank user agent falls back to [`DEFAULT_WEBHOOK_USER_AGENT`].
    #[must_use]
    pub fn new(disable_threshold: u32, backoff_base: Duration, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        let user_agent = if user_agent.trim().is_empty() {
            DEFAULT_WEBHOOK_USER_AGENT.to_owned()
        } else {
            user_agent.trim().to_owned()
        };

        Self {
            disable_threshold: disable_threshold.max(1),
            backoff_base,
            user_agent,
        }
    }

    /// Consecutive exhausted dispatches that pause a subscription.
    #[must_use]
    pub fn disable_threshold(&self) -> u32 {
        self.disable_threshold
    }

    /// Wait before the second attempt.
    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    /// Delivery agent identifier.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_str()
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt - 1)`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

impl Default for WebhookDeliveryConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_WEBHOOK_DISABLE_THRESHOLD,
            DEFAULT_WEBHOOK_BACKOFF_BASE,
            DEFAULT_WEBHOOK_USER_AGENT,
        )
    }
}
