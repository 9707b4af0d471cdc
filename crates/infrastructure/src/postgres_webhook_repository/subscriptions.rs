use super::*;

impl PostgresWebhookRepository {
    /// Inserts or replaces one subscription record, encrypting its secret.
    ///
    /// Registration lives outside the delivery engine; this is used for
    /// seeding and tests.
    pub async fn save_subscription(&self, subscription: &WebhookSubscription) -> AppResult<()> {
        let secret_ciphertext = subscription
            .secret()
            .map(|secret| self.secret_encryptor.encrypt(secret.expose_bytes()))
            .transpose()?;
        let topics: Vec<String> = subscription
            .topics()
            .iter()
            .map(|topic| topic.as_str().to_owned())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO webhook_subscriptions (
                id,
                tenant_id,
                owner_user_id,
                name,
                delivery_url,
                is_enabled,
                topics,
                api_version,
                secret_ciphertext,
                last_triggered_at,
                failure_count,
                max_retries,
                timeout_ms,
                custom_headers
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                owner_user_id = EXCLUDED.owner_user_id,
                name = EXCLUDED.name,
                delivery_url = EXCLUDED.delivery_url,
                is_enabled = EXCLUDED.is_enabled,
                topics = EXCLUDED.topics,
                api_version = EXCLUDED.api_version,
                secret_ciphertext = EXCLUDED.secret_ciphertext,
                last_triggered_at = EXCLUDED.last_triggered_at,
                failure_count = EXCLUDED.failure_count,
                max_retries = EXCLUDED.max_retries,
                timeout_ms = EXCLUDED.timeout_ms,
                custom_headers = EXCLUDED.custom_headers,
                updated_at = now()
            WHERE webhook_subscriptions.tenant_id = EXCLUDED.tenant_id
            "#,
        )
        .bind(subscription.id().as_uuid())
        .bind(subscription.tenant_id().as_uuid())
        .bind(subscription.owner_user_id().as_str())
        .bind(subscription.name().as_str())
        .bind(subscription.delivery_url().as_str())
        .bind(subscription.is_enabled())
        .bind(topics)
        .bind(subscription.api_version().as_str())
        .bind(secret_ciphertext)
        .bind(subscription.last_triggered_at())
        .bind(integer_column::<i32, u32>(subscription.failure_count(), "failure_count")?)
        .bind(i16::from(subscription.max_retries()))
        .bind(integer_column::<i32, u32>(subscription.timeout_ms(), "timeout_ms")?)
        .bind(Json(subscription.custom_headers()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save webhook subscription '{}': {error}",
                subscription.id()
            ))
        })?;

        Ok(())
    }

    pub(super) async fn list_matching_subscriptions_impl(
        &self,
        tenant_id: TenantId,
        topic: WebhookTopic,
    ) -> AppResult<Vec<WebhookSubscription>> {
        let rows = sqlx::query_as::<_, WebhookSubscriptionRow>(
            r#"
            SELECT
                id,
                tenant_id,
                owner_user_id,
                name,
                delivery_url,
                is_enabled,
                topics,
                api_version,
                secret_ciphertext,
                last_triggered_at,
                failure_count,
                max_retries,
                timeout_ms,
                custom_headers
            FROM webhook_subscriptions
            WHERE tenant_id = $1
                AND is_enabled = TRUE
                AND topics @> ARRAY[$2]::TEXT[]
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(topic.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list webhook subscriptions for tenant '{tenant_id}': {error}"
            ))
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let subscription_id = row.id;
                match self.subscription_from_row(row) {
                    Ok(subscription) => Some(subscription),
                    Err(error) => {
                        warn!(
                            %tenant_id,
                            %subscription_id,
                            %error,
                            "skipping unreadable webhook subscription"
                        );
                        None
                    }
                }
            })
            .collect())
    }

    pub(super) async fn find_subscription_impl(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
    ) -> AppResult<Option<WebhookSubscription>> {
        let row = sqlx::query_as::<_, WebhookSubscriptionRow>(
            r#"
            SELECT
                id,
                tenant_id,
                owner_user_id,
                name,
                delivery_url,
                is_enabled,
                topics,
                api_version,
                secret_ciphertext,
                last_triggered_at,
                failure_count,
                max_retries,
                timeout_ms,
                custom_headers
            FROM webhook_subscriptions
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find webhook subscription '{subscription_id}': {error}"
            ))
        })?;

        row.map(|row| self.subscription_from_row(row)).transpose()
    }

    pub(super) async fn record_dispatch_success_impl(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        triggered_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_subscriptions
            SET failure_count = 0,
                last_triggered_at = $3,
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .bind(triggered_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record webhook success for '{subscription_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "webhook subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        Ok(())
    }

    pub(super) async fn record_dispatch_exhausted_impl(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        disable_threshold: u32,
    ) -> AppResult<WebhookHealthUpdate> {
        let disable_threshold = i32::try_from(disable_threshold.max(1)).unwrap_or(i32::MAX);
        let row = sqlx::query_as::<_, WebhookHealthRow>(
            r#"
            UPDATE webhook_subscriptions
            SET failure_count = failure_count + 1,
                is_enabled = CASE
                    WHEN failure_count + 1 >= $3 THEN FALSE
                    ELSE is_enabled
                END,
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING failure_count, is_enabled
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .bind(disable_threshold)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record webhook failure for '{subscription_id}': {error}"
            ))
        })?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "webhook subscription '{subscription_id}' does not exist for tenant '{tenant_id}'"
            ))
        })?;

        Ok(WebhookHealthUpdate {
            failure_count: integer_column(row.failure_count, "failure_count")?,
            is_enabled: row.is_enabled,
        })
    }

    fn subscription_from_row(&self, row: WebhookSubscriptionRow) -> AppResult<WebhookSubscription> {
        let topics = row
            .topics
            .iter()
            .map(|topic| WebhookTopic::parse(topic.as_str()))
            .collect::<AppResult<Vec<_>>>()?;
        let secret = row
            .secret_ciphertext
            .as_deref()
            .and_then(|ciphertext| self.decrypt_secret(row.id, ciphertext));

        WebhookSubscription::new(WebhookSubscriptionInput {
            id: SubscriptionId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            owner_user_id: row.owner_user_id,
            name: row.name,
            delivery_url: row.delivery_url,
            is_enabled: row.is_enabled,
            topics,
            api_version: row.api_version,
            secret,
            last_triggered_at: row.last_triggered_at,
            failure_count: integer_column(row.failure_count, "failure_count")?,
            max_retries: integer_column(row.max_retries, "max_retries")?,
            timeout_ms: integer_column(row.timeout_ms, "timeout_ms")?,
            custom_headers: row.custom_headers.0,
        })
    }

    fn decrypt_secret(&self, subscription_id: uuid::Uuid, ciphertext: &[u8]) -> Option<WebhookSecret> {
        let plaintext = match self.secret_encryptor.decrypt(ciphertext) {
            Ok(plaintext) => plaintext,
            Err(error) => {
                warn!(%subscription_id, %error, "webhook secret cannot be decrypted");
                return None;
            }
        };

        String::from_utf8(plaintext)
            .ok()
            .and_then(|value| WebhookSecret::new(value).ok())
    }
}
