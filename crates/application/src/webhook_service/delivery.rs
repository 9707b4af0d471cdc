use chrono::Utc;
use fieldops_domain::{
    WEBHOOK_ATTEMPT_HEADER, WEBHOOK_DELIVERY_ID_HEADER, WEBHOOK_SIGNATURE_HEADER,
    WEBHOOK_SUBSCRIPTION_ID_HEADER, WEBHOOK_TOPIC_HEADER, WebhookDeliveryAttempt, WebhookEvent,
    WebhookSubscription, truncate_response_body,
};
use serde_json::Value;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::webhook_ports::{WebhookDeliveryError, WebhookRequest};
use crate::webhook_signature::sign_webhook_payload;

use super::*;

/// Body, audit snapshot and signature shared by every attempt of one run.
pub(super) struct EncodedDelivery {
    topic: String,
    payload: Value,
    body: Vec<u8>,
    signature: String,
}

/// Observed result of one attempt.
pub(super) struct AttemptReport {
    pub(super) http_status: Option<u16>,
    pub(super) response_body: Option<String>,
    pub(super) error: Option<WebhookDeliveryError>,
    pub(super) processing_time_ms: u64,
}

pub(super) fn encode_delivery(
    subscription: &WebhookSubscription,
    event: &WebhookEvent,
) -> Result<EncodedDelivery, WebhookDeliveryError> {
    let secret = subscription.secret().ok_or_else(|| {
        WebhookDeliveryError::Configuration(format!(
            "webhook subscription '{}' has no usable signing secret",
            subscription.id()
        ))
    })?;

    let payload = event.payload_for(subscription);
    let body = serde_json::to_vec(&payload).map_err(|error| {
        WebhookDeliveryError::Configuration(format!("failed to serialize webhook payload: {error}"))
    })?;
    let payload = serde_json::from_slice::<Value>(body.as_slice()).map_err(|error| {
        WebhookDeliveryError::Configuration(format!("failed to snapshot webhook payload: {error}"))
    })?;
    let signature = sign_webhook_payload(body.as_slice(), secret)
        .map_err(|error| WebhookDeliveryError::Configuration(error.to_string()))?;

    Ok(EncodedDelivery {
        topic: event.topic().to_owned(),
        payload,
        body,
        signature,
    })
}

impl WebhookService {
    /// Runs the attempt loop for one subscription.
    pub(super) async fn deliver(
        &self,
        subscription: &WebhookSubscription,
        event: &WebhookEvent,
    ) -> WebhookDispatchOutcome {
        let subscription_id = subscription.id();
        trace_state(subscription_id, event.id(), WebhookDeliveryState::Pending, 0);

        let encoded = match encode_delivery(subscription, event) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(
                    tenant_id = %subscription.tenant_id(),
                    %subscription_id,
                    event_id = event.id(),
                    %error,
                    "skipping webhook subscription"
                );
                return WebhookDispatchOutcome::Skipped {
                    subscription_id,
                    reason: error.to_string(),
                };
            }
        };

        let max_attempts = subscription.max_attempts();
        let mut attempt = 1;
        loop {
            trace_state(subscription_id, event.id(), WebhookDeliveryState::Attempting, attempt);
            let report = self.send_attempt(subscription, &encoded, attempt, false).await;

            match report.error {
                None => {
                    trace_state(subscription_id, event.id(), WebhookDeliveryState::Succeeded, attempt);
                    self.record_success(subscription).await;
                    return WebhookDispatchOutcome::Succeeded {
                        subscription_id,
                        attempts: attempt,
                    };
                }
                Some(error) if attempt < max_attempts && error.is_retryable() => {
                    let delay = self.config.backoff_delay(attempt);
                    debug!(
                        %subscription_id,
                        event_id = event.id(),
                        attempt,
                        state = WebhookDeliveryState::RetryWait.as_str(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "webhook attempt failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Some(error) => {
                    trace_state(subscription_id, event.id(), WebhookDeliveryState::Exhausted, attempt);
                    warn!(
                        tenant_id = %subscription.tenant_id(),
                        %subscription_id,
                        event_id = event.id(),
                        attempts = attempt,
                        %error,
                        "webhook delivery exhausted"
                    );
                    self.record_exhausted(subscription).await;
                    return WebhookDispatchOutcome::Exhausted {
                        subscription_id,
                        attempts: attempt,
                    };
                }
            }
        }
    }

    /// Sends one attempt bounded by the subscription timeout and audits it.
    pub(super) async fn send_attempt(
        &self,
        subscription: &WebhookSubscription,
        encoded: &EncodedDelivery,
        attempt: u32,
        is_test: bool,
    ) -> AttemptReport {
        let delivery_id = Uuid::new_v4();
        let request = WebhookRequest {
            url: subscription.delivery_url().clone(),
            headers: self.delivery_headers(subscription, encoded, delivery_id, attempt),
            body: encoded.body.clone(),
        };

        let timestamp = Utc::now();
        let started = Instant::now();
        let result = match timeout(subscription.timeout(), self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(WebhookDeliveryError::Timeout {
                timeout_ms: subscription.timeout_ms(),
            }),
        };
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let report = match result {
            Ok(response) => {
                let body = truncate_response_body(response.body.as_str());
                let error = (!response.is_success()).then(|| WebhookDeliveryError::Protocol {
                    status: response.status,
                    status_text: response.status_text.clone(),
                });
                AttemptReport {
                    http_status: Some(response.status),
                    response_body: (!body.is_empty()).then_some(body),
                    error,
                    processing_time_ms,
                }
            }
            Err(error) => AttemptReport {
                http_status: None,
                response_body: None,
                error: Some(error),
                processing_time_ms,
            },
        };

        let record = WebhookDeliveryAttempt {
            id: delivery_id,
            subscription_id: subscription.id(),
            tenant_id: subscription.tenant_id(),
            topic: encoded.topic.clone(),
            payload: encoded.payload.clone(),
            delivery_url: subscription.delivery_url().to_string(),
            http_status: report.http_status,
            response_body: report.response_body.clone(),
            error_message: report.error.as_ref().map(ToString::to_string),
            attempt,
            success: report.error.is_none(),
            is_test,
            processing_time_ms,
            timestamp,
        };

        if let Err(error) = self.delivery_log.append_attempt(record).await {
            error!(
                subscription_id = %subscription.id(),
                %delivery_id,
                attempt,
                %error,
                "failed to append webhook delivery attempt"
            );
        }

        report
    }

    fn delivery_headers(
        &self,
        subscription: &WebhookSubscription,
        encoded: &EncodedDelivery,
        delivery_id: Uuid,
        attempt: u32,
    ) -> Vec<(String, String)> {
        // Custom header names never collide with these; subscriptions reject reserved names.
        let mut headers = vec![
            ("content-type".to_owned(), "application/json".to_owned()),
            ("user-agent".to_owned(), self.config.user_agent().to_owned()),
            (WEBHOOK_SIGNATURE_HEADER.to_owned(), encoded.signature.clone()),
            (WEBHOOK_TOPIC_HEADER.to_owned(), encoded.topic.clone()),
            (
                WEBHOOK_SUBSCRIPTION_ID_HEADER.to_owned(),
                subscription.id().to_string(),
            ),
            (WEBHOOK_DELIVERY_ID_HEADER.to_owned(), delivery_id.to_string()),
            (WEBHOOK_ATTEMPT_HEADER.to_owned(), attempt.to_string()),
        ];

        headers.extend(
            subscription
                .custom_headers()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );

        headers
    }
}

fn trace_state(
    subscription_id: SubscriptionId,
    event_id: &str,
    state: WebhookDeliveryState,
    attempt: u32,
) {
    debug!(%subscription_id, event_id, attempt, state = state.as_str(), "webhook delivery state");
}
