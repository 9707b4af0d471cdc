use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;

use fieldops_core::{AppError, AppResult, SubscriptionId, TenantId};
use fieldops_domain::{
    WEBHOOK_ATTEMPT_HEADER, WEBHOOK_DELIVERY_ID_HEADER, WEBHOOK_PING_TOPIC,
    WEBHOOK_SIGNATURE_HEADER, WEBHOOK_SUBSCRIPTION_ID_HEADER, WEBHOOK_TOPIC_HEADER,
    WebhookDeliveryAttempt, WebhookSecret, WebhookSubscription, WebhookSubscriptionInput,
    WebhookTopic,
};

use crate::verify_webhook_signature;
use crate::webhook_ports::{
    DeliveryAttemptQuery, WebhookDeliveryError, WebhookDeliveryLog, WebhookHealthUpdate,
    WebhookRequest, WebhookResponse, WebhookSubscriptionRepository, WebhookTransport,
};

use super::{WebhookDeliveryConfig, WebhookDispatchOutcome, WebhookService};

const SECRET: &str = "whsec_fieldops_test";

#[derive(Default)]
struct FakeSubscriptionRepository {
    subscriptions: Mutex<HashMap<SubscriptionId, WebhookSubscription>>,
}

impl FakeSubscriptionRepository {
    fn with(subscriptions: Vec<WebhookSubscription>) -> Self {
        Self {
            subscriptions: Mutex::new(
                subscriptions
                    .into_iter()
                    .map(|subscription| (subscription.id(), subscription))
                    .collect(),
            ),
        }
    }

    async fn snapshot(&self, subscription_id: SubscriptionId) -> WebhookSubscription {
        self.subscriptions
            .lock()
            .await
            .get(&subscription_id)
            .cloned()
            .unwrap_or_else(|| unreachable!())
    }
}

#[async_trait]
impl WebhookSubscriptionRepository for FakeSubscriptionRepository {
    async fn list_matching_subscriptions(
        &self,
        tenant_id: TenantId,
        topic: WebhookTopic,
    ) -> AppResult<Vec<WebhookSubscription>> {
        Ok(self
            .subscriptions
            .lock()
            .await
            .values()
            .filter(|subscription| {
                subscription.tenant_id() == tenant_id
                    && subscription.is_enabled()
                    && subscription.is_subscribed_to(topic)
            })
            .cloned()
            .collect())
    }

    async fn find_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<WebhookSubscription>> {
        Ok(self
            .subscriptions
            .lock()
            .await
            .get(&subscription_id)
            .filter(|subscription| subscription.tenant_id() == tenant_id)
            .cloned())
    }

    async fn record_dispatch_success(
        &self,
        _tenant_id: TenantId,
        subscription_id: SubscriptionId,
        triggered_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().await;
        let subscription = subscriptions
            .get_mut(&subscription_id)
            .ok_or_else(|| AppError::NotFound(subscription_id.to_string()))?;
        subscription.mark_dispatch_succeeded(triggered_at);
        Ok(())
    }

    async fn record_dispatch_exhausted(
        &self,
        _tenant_id: TenantId,
        subscription_id: SubscriptionId,
        disable_threshold: u32,
    ) -> AppResult<WebhookHealthUpdate> {
        let mut subscriptions = self.subscriptions.lock().await;
        let subscription = subscriptions
            .get_mut(&subscription_id)
            .ok_or_else(|| AppError::NotFound(subscription_id.to_string()))?;
        subscription.mark_dispatch_exhausted(disable_threshold);
        Ok(WebhookHealthUpdate {
            failure_count: subscription.failure_count(),
            is_enabled: subscription.is_enabled(),
        })
    }
}

#[derive(Default)]
struct FakeDeliveryLog {
    attempts: Mutex<Vec<WebhookDeliveryAttempt>>,
}

impl FakeDeliveryLog {
    async fn for_subscription(&self, subscription_id: SubscriptionId) -> Vec<WebhookDeliveryAttempt> {
        self.attempts
            .lock()
            .await
            .iter()
            .filter(|attempt| attempt.subscription_id == subscription_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WebhookDeliveryLog for FakeDeliveryLog {
    async fn append_attempt(&self, attempt: WebhookDeliveryAttempt) -> AppResult<()> {
        self.attempts.lock().await.push(attempt);
        Ok(())
    }

    async fn list_attempts(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        query: DeliveryAttemptQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        Ok(self
            .attempts
            .lock()
            .await
            .iter()
            .rev()
            .filter(|attempt| {
                attempt.tenant_id == tenant_id && attempt.subscription_id == subscription_id
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

struct UnavailableDeliveryLog;

#[async_trait]
impl WebhookDeliveryLog for UnavailableDeliveryLog {
    async fn append_attempt(&self, _attempt: WebhookDeliveryAttempt) -> AppResult<()> {
        Err(AppError::Internal("delivery log offline".to_owned()))
    }

    async fn list_attempts(
        &self,
        _tenant_id: TenantId,
        _subscription_id: SubscriptionId,
        _query: DeliveryAttemptQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        Err(AppError::Internal("delivery log offline".to_owned()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Reply {
    Status(u16),
    Hang,
    Refuse,
}

struct SentRequest {
    at: Instant,
    request: WebhookRequest,
}

/// Scripted subscriber endpoints keyed by URL; the last reply repeats.
#[derive(Default)]
struct FakeTransport {
    replies: HashMap<String, Vec<Reply>>,
    sent: Mutex<Vec<SentRequest>>,
}

impl FakeTransport {
    fn route(mut self, url: &str, replies: Vec<Reply>) -> Self {
        self.replies.insert(url.to_owned(), replies);
        self
    }

    async fn sent_to(&self, url: &str) -> Vec<(Instant, WebhookRequest)> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|sent| sent.request.url.as_str() == url)
            .map(|sent| (sent.at, sent.request.clone()))
            .collect()
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[async_trait]
impl WebhookTransport for FakeTransport {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, WebhookDeliveryError> {
        let reply = {
            let mut sent = self.sent.lock().await;
            let previous = sent
                .iter()
                .filter(|entry| entry.request.url == request.url)
                .count();
            let script = self
                .replies
                .get(request.url.as_str())
                .cloned()
                .unwrap_or_else(|| vec![Reply::Status(200)]);
            let reply = script
                .get(previous)
                .or_else(|| script.last())
                .copied()
                .unwrap_or(Reply::Status(200));

            sent.push(SentRequest {
                at: Instant::now(),
                request,
            });
            reply
        };

        match reply {
            Reply::Status(status) => Ok(WebhookResponse {
                status,
                status_text: status_text(status).to_owned(),
                body: format!("{{\"received\":{status}}}"),
            }),
            Reply::Hang => std::future::pending().await,
            Reply::Refuse => Err(WebhookDeliveryError::Transport(
                "error sending request: connection refused".to_owned(),
            )),
        }
    }
}

struct Harness {
    repository: Arc<FakeSubscriptionRepository>,
    delivery_log: Arc<FakeDeliveryLog>,
    transport: Arc<FakeTransport>,
    service: WebhookService,
}

fn harness(transport: FakeTransport, subscriptions: Vec<WebhookSubscription>) -> Harness {
    let repository = Arc::new(FakeSubscriptionRepository::with(subscriptions));
    let delivery_log = Arc::new(FakeDeliveryLog::default());
    let transport = Arc::new(transport);
    let service = WebhookService::new(repository.clone(), delivery_log.clone(), transport.clone());

    Harness {
        repository,
        delivery_log,
        transport,
        service,
    }
}

fn input(tenant_id: TenantId, url: &str, max_retries: u8) -> WebhookSubscriptionInput {
    WebhookSubscriptionInput {
        id: SubscriptionId::new(),
        tenant_id,
        owner_user_id: "owner-1".to_owned(),
        name: "Dispatch integration".to_owned(),
        delivery_url: url.to_owned(),
        is_enabled: true,
        topics: vec![WebhookTopic::WorkOrderCreated, WebhookTopic::TaskUpdated],
        api_version: "v1".to_owned(),
        secret: WebhookSecret::new(SECRET).ok(),
        last_triggered_at: None,
        failure_count: 0,
        max_retries,
        timeout_ms: 1_000,
        custom_headers: BTreeMap::new(),
    }
}

fn build(input: WebhookSubscriptionInput) -> WebhookSubscription {
    WebhookSubscription::new(input).unwrap_or_else(|_| unreachable!())
}

fn outcome_for(
    outcomes: &[WebhookDispatchOutcome],
    subscription_id: SubscriptionId,
) -> Option<WebhookDispatchOutcome> {
    outcomes
        .iter()
        .find(|outcome| outcome.subscription_id() == subscription_id)
        .cloned()
}

fn body_json(request: &WebhookRequest) -> Value {
    serde_json::from_slice(request.body.as_slice()).unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn failing_endpoint_receives_retries_plus_one_attempts() {
    let tenant_id = TenantId::new();
    let url = "https://fail.example.com/hook";
    let subscription = build(input(tenant_id, url, 3));
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(500)]),
        vec![subscription],
    );

    let outcomes = harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({"id": "wo-1"}), None)
        .await;

    assert_eq!(
        outcome_for(&outcomes, subscription_id),
        Some(WebhookDispatchOutcome::Exhausted {
            subscription_id,
            attempts: 4
        })
    );

    let attempts = harness.delivery_log.for_subscription(subscription_id).await;
    assert_eq!(attempts.len(), 4);
    assert_eq!(
        attempts.iter().map(|attempt| attempt.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert!(attempts.iter().all(|attempt| !attempt.success && !attempt.is_test));
    assert_eq!(
        attempts[0].error_message.as_deref(),
        Some("HTTP 500: Internal Server Error")
    );
    assert_eq!(attempts[0].http_status, Some(500));

    let stored = harness.repository.snapshot(subscription_id).await;
    assert_eq!(stored.failure_count(), 1);
    assert!(stored.is_enabled());
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts() {
    let tenant_id = TenantId::new();
    let url = "https://slow.example.com/hook";
    let subscription = build(input(tenant_id, url, 3));
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(500)]),
        vec![subscription],
    );

    harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    let sent = harness.transport.sent_to(url).await;
    assert_eq!(sent.len(), 4);

    let expected = [1_u64, 2, 4];
    for (index, expected_seconds) in expected.into_iter().enumerate() {
        let gap = sent[index + 1].0.duration_since(sent[index].0);
        let expected = Duration::from_secs(expected_seconds);
        assert!(gap >= expected, "gap {gap:?} shorter than {expected:?}");
        assert!(gap < expected + Duration::from_millis(10));
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_starts_after_a_timed_out_attempt_ends() {
    let tenant_id = TenantId::new();
    let url = "https://hanging.example.com/hook";
    let subscription = build(input(tenant_id, url, 2));
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Hang, Reply::Hang, Reply::Status(200)]),
        vec![subscription],
    );

    harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    let sent = harness.transport.sent_to(url).await;
    assert_eq!(sent.len(), 3);

    // 1 s timeout, then 1 s and 2 s of backoff.
    let expected = [2_u64, 3];
    for (index, expected_seconds) in expected.into_iter().enumerate() {
        let gap = sent[index + 1].0.duration_since(sent[index].0);
        let expected = Duration::from_secs(expected_seconds);
        assert!(gap >= expected, "gap {gap:?} shorter than {expected:?}");
        assert!(gap < expected + Duration::from_millis(10));
    }
}

#[tokio::test(start_paused = true)]
async fn configured_backoff_base_scales_waits() {
    let tenant_id = TenantId::new();
    let url = "https://tuned.example.com/hook";
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(500)]),
        vec![build(input(tenant_id, url, 2))],
    );
    let service = harness.service.clone().with_delivery_config(WebhookDeliveryConfig::new(
        10,
        Duration::from_millis(100),
        "",
    ));

    service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    let sent = harness.transport.sent_to(url).await;
    assert_eq!(sent.len(), 3);
    let total = sent[2].0.duration_since(sent[0].0);
    assert!(total >= Duration::from_millis(300));
    assert!(total < Duration::from_millis(320));
}

#[tokio::test(start_paused = true)]
async fn event_id_is_stable_across_attempts_and_subscribers() {
    let tenant_id = TenantId::new();
    let first_url = "https://first.example.com/hook";
    let second_url = "https://second.example.com/hook";
    let harness = harness(
        FakeTransport::default()
            .route(first_url, vec![Reply::Status(500), Reply::Status(200)])
            .route(second_url, vec![Reply::Status(200)]),
        vec![
            build(input(tenant_id, first_url, 2)),
            build(input(tenant_id, second_url, 0)),
        ],
    );

    harness
        .service
        .dispatch_event(
            tenant_id,
            WebhookTopic::WorkOrderCreated,
            json!({"workOrderId": "wo-7"}),
            Some("evt-123".to_owned()),
        )
        .await;

    let mut requests = harness.transport.sent_to(first_url).await;
    requests.extend(harness.transport.sent_to(second_url).await);
    assert_eq!(requests.len(), 3);

    for (_, request) in &requests {
        assert_eq!(body_json(request).get("id"), Some(&json!("evt-123")));
    }

    let first = harness.transport.sent_to(first_url).await;
    assert_eq!(first[0].1.header(WEBHOOK_ATTEMPT_HEADER), Some("1"));
    assert_eq!(first[1].1.header(WEBHOOK_ATTEMPT_HEADER), Some("2"));
    assert_ne!(
        first[0].1.header(WEBHOOK_DELIVERY_ID_HEADER),
        first[1].1.header(WEBHOOK_DELIVERY_ID_HEADER)
    );
}

#[tokio::test(start_paused = true)]
async fn delivery_carries_signed_body_and_protocol_headers() {
    let tenant_id = TenantId::new();
    let url = "https://headers.example.com/hook";
    let mut subscription_input = input(tenant_id, url, 0);
    subscription_input.api_version = "2025-02-01".to_owned();
    subscription_input
        .custom_headers
        .insert("X-Tenant-Ref".to_owned(), "acme".to_owned());
    let subscription = build(subscription_input);
    let subscription_id = subscription.id();
    let harness = harness(FakeTransport::default(), vec![subscription]);

    harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::TaskUpdated, json!({"taskId": "t-1"}), None)
        .await;

    let sent = harness.transport.sent_to(url).await;
    assert_eq!(sent.len(), 1);
    let request = &sent[0].1;

    let secret = WebhookSecret::new(SECRET).unwrap_or_else(|_| unreachable!());
    let signature = request.header(WEBHOOK_SIGNATURE_HEADER).unwrap_or_default();
    assert!(verify_webhook_signature(request.body.as_slice(), signature, &secret));

    assert_eq!(request.header("Content-Type"), Some("application/json"));
    assert_eq!(request.header("User-Agent"), Some("Fieldops-Webhooks/1.0"));
    assert_eq!(request.header(WEBHOOK_TOPIC_HEADER), Some("task.updated"));
    let subscription_header = subscription_id.to_string();
    assert_eq!(
        request.header(WEBHOOK_SUBSCRIPTION_ID_HEADER),
        Some(subscription_header.as_str())
    );
    assert_eq!(request.header("x-tenant-ref"), Some("acme"));
    let signature_headers = request
        .headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(WEBHOOK_SIGNATURE_HEADER))
        .count();
    assert_eq!(signature_headers, 1);

    let body = body_json(request);
    assert_eq!(body.get("apiVersion"), Some(&json!("2025-02-01")));
    assert_eq!(body.get("tenantId"), Some(&json!(tenant_id.to_string())));
    assert_eq!(body.get("data"), Some(&json!({"taskId": "t-1"})));

    let attempts = harness.delivery_log.for_subscription(subscription_id).await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].payload, body);
    let delivery_id = attempts[0].id.to_string();
    assert_eq!(
        request.header(WEBHOOK_DELIVERY_ID_HEADER),
        Some(delivery_id.as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_dispatch_at_threshold_disables_subscription() {
    let tenant_id = TenantId::new();
    let url = "https://flaky.example.com/hook";
    let mut subscription_input = input(tenant_id, url, 0);
    subscription_input.failure_count = 9;
    let subscription = build(subscription_input);
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(500)]),
        vec![subscription],
    );

    harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    let stored = harness.repository.snapshot(subscription_id).await;
    assert_eq!(stored.failure_count(), 10);
    assert!(!stored.is_enabled());

    let outcomes = harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;
    assert!(outcomes.is_empty());
    assert_eq!(harness.transport.sent_to(url).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn success_resets_failure_streak() {
    let tenant_id = TenantId::new();
    let url = "https://recovering.example.com/hook";
    let mut subscription_input = input(tenant_id, url, 2);
    subscription_input.failure_count = 9;
    let subscription = build(subscription_input);
    let subscription_id = subscription.id();
    let harness = harness(FakeTransport::default(), vec![subscription]);

    let outcomes = harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    assert_eq!(
        outcome_for(&outcomes, subscription_id),
        Some(WebhookDispatchOutcome::Succeeded {
            subscription_id,
            attempts: 1
        })
    );
    let stored = harness.repository.snapshot(subscription_id).await;
    assert_eq!(stored.failure_count(), 0);
    assert!(stored.is_enabled());
    assert!(stored.last_triggered_at().is_some());
}

#[tokio::test(start_paused = true)]
async fn failing_subscriber_does_not_delay_healthy_subscriber() {
    let tenant_id = TenantId::new();
    let failing_url = "https://down.example.com/hook";
    let healthy_url = "https://up.example.com/hook";
    let failing = build(input(tenant_id, failing_url, 5));
    let healthy = build(input(tenant_id, healthy_url, 5));
    let failing_id = failing.id();
    let healthy_id = healthy.id();
    let harness = harness(
        FakeTransport::default()
            .route(failing_url, vec![Reply::Status(500)])
            .route(healthy_url, vec![Reply::Status(200)]),
        vec![failing, healthy],
    );

    let started = Instant::now();
    let outcomes = harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    assert_eq!(
        outcome_for(&outcomes, healthy_id),
        Some(WebhookDispatchOutcome::Succeeded {
            subscription_id: healthy_id,
            attempts: 1
        })
    );
    assert_eq!(
        outcome_for(&outcomes, failing_id),
        Some(WebhookDispatchOutcome::Exhausted {
            subscription_id: failing_id,
            attempts: 6
        })
    );

    let healthy_sent = harness.transport.sent_to(healthy_url).await;
    assert!(healthy_sent[0].0.duration_since(started) < Duration::from_millis(10));

    let healthy_stored = harness.repository.snapshot(healthy_id).await;
    assert!(healthy_stored.last_triggered_at().is_some());
    assert_eq!(healthy_stored.failure_count(), 0);
    assert_eq!(harness.repository.snapshot(failing_id).await.failure_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeouts_then_success_leave_subscription_healthy() {
    let tenant_id = TenantId::new();
    let url = "https://timeouts.example.com/hook";
    let subscription = build(input(tenant_id, url, 2));
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Hang, Reply::Hang, Reply::Status(200)]),
        vec![subscription],
    );

    let outcomes = harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    assert_eq!(
        outcome_for(&outcomes, subscription_id),
        Some(WebhookDispatchOutcome::Succeeded {
            subscription_id,
            attempts: 3
        })
    );

    let attempts = harness.delivery_log.for_subscription(subscription_id).await;
    assert_eq!(attempts.len(), 3);
    for timed_out in &attempts[..2] {
        assert!(!timed_out.success);
        assert_eq!(timed_out.http_status, None);
        assert_eq!(
            timed_out.error_message.as_deref(),
            Some("Request timeout after 1000ms")
        );
        assert!(timed_out.processing_time_ms >= 1_000);
    }
    assert!(attempts[2].success);
    assert_eq!(attempts[2].http_status, Some(200));

    let stored = harness.repository.snapshot(subscription_id).await;
    assert_eq!(stored.failure_count(), 0);
    assert!(stored.is_enabled());
}

#[tokio::test(start_paused = true)]
async fn single_unavailable_answer_without_retries_counts_one_failure() {
    let tenant_id = TenantId::new();
    let url = "https://maintenance.example.com/hook";
    let subscription = build(input(tenant_id, url, 0));
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(503)]),
        vec![subscription],
    );

    harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    let attempts = harness.delivery_log.for_subscription(subscription_id).await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(
        attempts[0].error_message.as_deref(),
        Some("HTTP 503: Service Unavailable")
    );
    assert_eq!(attempts[0].response_body.as_deref(), Some("{\"received\":503}"));

    let stored = harness.repository.snapshot(subscription_id).await;
    assert_eq!(stored.failure_count(), 1);
    assert!(stored.is_enabled());
}

#[tokio::test(start_paused = true)]
async fn transport_error_message_is_recorded() {
    let tenant_id = TenantId::new();
    let url = "https://refused.example.com/hook";
    let subscription = build(input(tenant_id, url, 1));
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Refuse]),
        vec![subscription],
    );

    harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    let attempts = harness.delivery_log.for_subscription(subscription_id).await;
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        attempts[1].error_message.as_deref(),
        Some("error sending request: connection refused")
    );
}

#[tokio::test(start_paused = true)]
async fn subscription_without_secret_is_skipped() {
    let tenant_id = TenantId::new();
    let url = "https://unsigned.example.com/hook";
    let mut subscription_input = input(tenant_id, url, 3);
    subscription_input.secret = None;
    let subscription = build(subscription_input);
    let subscription_id = subscription.id();
    let harness = harness(FakeTransport::default(), vec![subscription]);

    let outcomes = harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    assert!(matches!(
        outcome_for(&outcomes, subscription_id),
        Some(WebhookDispatchOutcome::Skipped { .. })
    ));
    assert!(harness.transport.sent_to(url).await.is_empty());
    assert!(harness.delivery_log.for_subscription(subscription_id).await.is_empty());
    assert_eq!(harness.repository.snapshot(subscription_id).await.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn only_matching_subscriptions_of_the_tenant_are_dispatched() {
    let tenant_id = TenantId::new();
    let other_tenant_url = "https://other-tenant.example.com/hook";
    let other_topic_url = "https://other-topic.example.com/hook";
    let mut other_topic = input(tenant_id, other_topic_url, 0);
    other_topic.topics = vec![WebhookTopic::ClientDeleted];
    let harness = harness(
        FakeTransport::default(),
        vec![
            build(input(TenantId::new(), other_tenant_url, 0)),
            build(other_topic),
        ],
    );

    let outcomes = harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    assert!(outcomes.is_empty());
    assert!(harness.transport.sent_to(other_tenant_url).await.is_empty());
    assert!(harness.transport.sent_to(other_topic_url).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn trigger_returns_event_id_before_delivery_finishes() {
    let tenant_id = TenantId::new();
    let url = "https://background.example.com/hook";
    let subscription = build(input(tenant_id, url, 1));
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(500), Reply::Status(200)]),
        vec![subscription],
    );

    let triggered = harness.service.trigger(
        tenant_id,
        WebhookTopic::WorkOrderCreated,
        json!({}),
        Some("evt-bg".to_owned()),
    );
    assert_eq!(triggered.event_id, "evt-bg");

    let outcomes = triggered.outcomes.await.unwrap_or_default();
    assert_eq!(
        outcome_for(&outcomes, subscription_id),
        Some(WebhookDispatchOutcome::Succeeded {
            subscription_id,
            attempts: 2
        })
    );
}

#[tokio::test(start_paused = true)]
async fn delivery_log_failure_does_not_change_outcome() {
    let tenant_id = TenantId::new();
    let url = "https://audited.example.com/hook";
    let subscription = build(input(tenant_id, url, 0));
    let subscription_id = subscription.id();
    let repository = Arc::new(FakeSubscriptionRepository::with(vec![subscription]));
    let service = WebhookService::new(
        repository.clone(),
        Arc::new(UnavailableDeliveryLog),
        Arc::new(FakeTransport::default()),
    );

    let outcomes = service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    assert_eq!(
        outcome_for(&outcomes, subscription_id),
        Some(WebhookDispatchOutcome::Succeeded {
            subscription_id,
            attempts: 1
        })
    );
    assert!(repository.snapshot(subscription_id).await.last_triggered_at().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_webhook_never_touches_health_fields() {
    let tenant_id = TenantId::new();
    let url = "https://diagnostic.example.com/hook";
    let mut subscription_input = input(tenant_id, url, 5);
    subscription_input.failure_count = 10;
    subscription_input.is_enabled = false;
    let subscription = build(subscription_input);
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(500)]),
        vec![subscription],
    );

    let result = harness.service.test_webhook(tenant_id, subscription_id).await;
    assert!(result.is_ok());
    let result = result.unwrap_or_else(|_| unreachable!());
    assert!(!result.success);
    assert_eq!(result.http_status, Some(500));
    assert_eq!(
        result.error_message.as_deref(),
        Some("HTTP 500: Internal Server Error")
    );

    let sent = harness.transport.sent_to(url).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.header(WEBHOOK_TOPIC_HEADER), Some(WEBHOOK_PING_TOPIC));

    let attempts = harness.delivery_log.for_subscription(subscription_id).await;
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].is_test);
    assert_eq!(attempts[0].topic, WEBHOOK_PING_TOPIC);

    let stored = harness.repository.snapshot(subscription_id).await;
    assert_eq!(stored.failure_count(), 10);
    assert!(!stored.is_enabled());
    assert_eq!(stored.last_triggered_at(), None);
}

#[tokio::test(start_paused = true)]
async fn test_webhook_success_keeps_failure_streak() {
    let tenant_id = TenantId::new();
    let url = "https://diagnostic-ok.example.com/hook";
    let mut subscription_input = input(tenant_id, url, 0);
    subscription_input.failure_count = 4;
    let subscription = build(subscription_input);
    let subscription_id = subscription.id();
    let harness = harness(FakeTransport::default(), vec![subscription]);

    let result = harness
        .service
        .test_webhook(tenant_id, subscription_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(result.http_status, Some(200));
    assert_eq!(result.error_message, None);
    let stored = harness.repository.snapshot(subscription_id).await;
    assert_eq!(stored.failure_count(), 4);
    assert_eq!(stored.last_triggered_at(), None);
}

#[tokio::test]
async fn test_webhook_reports_missing_subscription_and_secret() {
    let tenant_id = TenantId::new();
    let mut unsigned = input(tenant_id, "https://unsigned.example.com/hook", 0);
    unsigned.secret = None;
    let unsigned = build(unsigned);
    let unsigned_id = unsigned.id();
    let harness = harness(FakeTransport::default(), vec![unsigned]);

    let missing = harness
        .service
        .test_webhook(tenant_id, SubscriptionId::new())
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let foreign = harness
        .service
        .test_webhook(TenantId::new(), unsigned_id)
        .await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    let unconfigured = harness.service.test_webhook(tenant_id, unsigned_id).await;
    assert!(matches!(unconfigured, Err(AppError::Configuration(_))));
}

#[tokio::test(start_paused = true)]
async fn delivery_attempts_are_listed_newest_first() {
    let tenant_id = TenantId::new();
    let url = "https://history.example.com/hook";
    let subscription = build(input(tenant_id, url, 2));
    let subscription_id = subscription.id();
    let harness = harness(
        FakeTransport::default().route(url, vec![Reply::Status(500)]),
        vec![subscription],
    );

    harness
        .service
        .dispatch_event(tenant_id, WebhookTopic::WorkOrderCreated, json!({}), None)
        .await;

    let listed = harness
        .service
        .list_delivery_attempts(
            tenant_id,
            subscription_id,
            DeliveryAttemptQuery {
                limit: 0,
                offset: 0,
            },
        )
        .await
        .unwrap_or_default();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].attempt, 3);

    let all = harness
        .service
        .list_delivery_attempts(tenant_id, subscription_id, DeliveryAttemptQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(
        all.iter().map(|attempt| attempt.attempt).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );

    let unknown = harness
        .service
        .list_delivery_attempts(tenant_id, SubscriptionId::new(), DeliveryAttemptQuery::default())
        .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}
