use fieldops_core::{AppError, AppResult, TenantId};
use fieldops_domain::{WebhookDeliveryAttempt, WebhookEvent};
use tracing::info;

use crate::webhook_ports::{DeliveryAttemptQuery, WebhookDeliveryError};

use super::delivery::encode_delivery;
use super::*;

/// Synchronous result of a diagnostic delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTestResult {
    /// Whether the subscriber answered with a 2xx status.
    pub success: bool,
    /// Response status when one arrived.
    pub http_status: Option<u16>,
    /// Truncated response body.
    pub response_body: Option<String>,
    /// Failure description.
    pub error_message: Option<String>,
    /// Wall time of the attempt.
    pub processing_time_ms: u64,
}

impl WebhookService {
    /// Sends one ping delivery to a subscription.
    ///
    /// The attempt is audited with `is_test` set; health fields are left
    /// untouched and disabled subscriptions can still be tested.
    pub async fn test_webhook(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<WebhookTestResult> {
        let subscription = self
            .subscription_repository
            .find_subscription(tenant_id, subscription_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "webhook subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
                ))
            })?;

        let event = WebhookEvent::ping(tenant_id, subscription_id);
        let encoded = encode_delivery(&subscription, &event).map_err(|error| match error {
            WebhookDeliveryError::Configuration(message) => AppError::Configuration(message),
            other => AppError::Internal(other.to_string()),
        })?;

        let report = self.send_attempt(&subscription, &encoded, 1, true).await;
        info!(
            %tenant_id,
            %subscription_id,
            success = report.error.is_none(),
            status = report.http_status,
            "webhook test delivery finished"
        );

        Ok(WebhookTestResult {
            success: report.error.is_none(),
            http_status: report.http_status,
            response_body: report.response_body,
            error_message: report.error.map(|error| error.to_string()),
            processing_time_ms: report.processing_time_ms,
        })
    }

    /// Lists audited attempts of one subscription, newest first.
    pub async fn list_delivery_attempts(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        query: DeliveryAttemptQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        if self
            .subscription_repository
            .find_subscription(tenant_id, subscription_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "webhook subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        self.delivery_log
            .list_attempts(tenant_id, subscription_id, query.normalized())
            .await
    }
}
