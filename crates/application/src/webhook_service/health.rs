use chrono::Utc;
use fieldops_domain::{WebhookHealth, WebhookSubscription};
use tracing::{error, info, warn};

use super::*;

impl WebhookService {
    pub(super) async fn record_success(&self, subscription: &WebhookSubscription) {
        if let Err(error) = self
            .subscription_repository
            .record_dispatch_success(subscription.tenant_id(), subscription.id(), Utc::now())
            .await
        {
            error!(
                subscription_id = %subscription.id(),
                %error,
                "failed to record webhook dispatch success"
            );
        }
    }

    pub(super) async fn record_exhausted(&self, subscription: &WebhookSubscription) {
        let disable_threshold = self.config.disable_threshold();
        let update = match self
            .subscription_repository
            .record_dispatch_exhausted(subscription.tenant_id(), subscription.id(), disable_threshold)
            .await
        {
            Ok(update) => update,
            Err(error) => {
                error!(
                    subscription_id = %subscription.id(),
                    %error,
                    "failed to record webhook dispatch failure"
                );
                return;
            }
        };

        match WebhookHealth::classify(update.failure_count, update.is_enabled, disable_threshold) {
            WebhookHealth::Disabled {
                consecutive_failures,
            } => warn!(
                tenant_id = %subscription.tenant_id(),
                subscription_id = %subscription.id(),
                consecutive_failures,
                disable_threshold,
                "webhook subscription auto-disabled"
            ),
            WebhookHealth::Failing {
                consecutive_failures,
            } => info!(
                subscription_id = %subscription.id(),
                consecutive_failures,
                "webhook subscription failing"
            ),
            WebhookHealth::Healthy => {}
        }
    }
}
