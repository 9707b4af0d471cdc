use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldops_application::{
    DeliveryAttemptQuery, SecretEncryptor, WebhookDeliveryLog, WebhookHealthUpdate,
    WebhookSubscriptionRepository,
};
use fieldops_core::{AppError, AppResult, SubscriptionId, TenantId};
use fieldops_domain::{
    WebhookDeliveryAttempt, WebhookSecret, WebhookSubscription, WebhookSubscriptionInput,
    WebhookTopic,
};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::warn;

mod delivery_log;
mod subscriptions;

/// PostgreSQL-backed webhook subscription store and delivery log.
///
/// Signing secrets are stored encrypted and decrypted on read.
#[derive(Clone)]
pub struct PostgresWebhookRepository {
    pool: PgPool,
    secret_encryptor: Arc<dyn SecretEncryptor>,
}

impl PostgresWebhookRepository {
    /// Creates a repository with the provided connection pool and secret encryptor.
    #[must_use]
    pub fn new(pool: PgPool, secret_encryptor: Arc<dyn SecretEncryptor>) -> Self {
        Self {
            pool,
            secret_encryptor,
        }
    }
}

#[derive(Debug, FromRow)]
struct WebhookSubscriptionRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    owner_user_id: String,
    name: String,
    delivery_url: String,
    is_enabled: bool,
    topics: Vec<String>,
    api_version: String,
    secret_ciphertext: Option<Vec<u8>>,
    last_triggered_at: Option<DateTime<Utc>>,
    failure_count: i32,
    max_retries: i16,
    timeout_ms: i32,
    custom_headers: Json<BTreeMap<String, String>>,
}

#[derive(Debug, FromRow)]
struct WebhookHealthRow {
    failure_count: i32,
    is_enabled: bool,
}

#[derive(Debug, FromRow)]
struct WebhookDeliveryAttemptRow {
    id: uuid::Uuid,
    subscription_id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    topic: String,
    payload: Value,
    delivery_url: String,
    http_status: Option<i16>,
    response_body: Option<String>,
    error_message: Option<String>,
    attempt: i32,
    success: bool,
    is_test: bool,
    processing_time_ms: i64,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl WebhookSubscriptionRepository for PostgresWebhookRepository {
    async fn list_matching_subscriptions(
        &self,
        tenant_id: TenantId,
        topic: WebhookTopic,
    ) -> AppResult<Vec<WebhookSubscription>> {
        self.list_matching_subscriptions_impl(tenant_id, topic).await
    }

    async fn find_subscription(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<WebhookSubscription>> {
        self.find_subscription_impl(tenant_id, subscription_id).await
    }

    async fn record_dispatch_success(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        triggered_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.record_dispatch_success_impl(tenant_id, subscription_id, triggered_at)
            .await
    }

    async fn record_dispatch_exhausted(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        disable_threshold: u32,
    ) -> AppResult<WebhookHealthUpdate> {
        self.record_dispatch_exhausted_impl(tenant_id, subscription_id, disable_threshold)
            .await
    }
}

#[async_trait]
impl WebhookDeliveryLog for PostgresWebhookRepository {
    async fn append_attempt(&self, attempt: WebhookDeliveryAttempt) -> AppResult<()> {
        self.append_attempt_impl(attempt).await
    }

    async fn list_attempts(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        query: DeliveryAttemptQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        self.list_attempts_impl(tenant_id, subscription_id, query)
            .await
    }
}

fn integer_column<T, S>(value: S, column: &str) -> AppResult<T>
where
    T: TryFrom<S>,
    S: Copy + std::fmt::Display,
{
    T::try_from(value).map_err(|_| {
        AppError::Internal(format!("stored webhook column '{column}' is out of range: {value}"))
    })
}
