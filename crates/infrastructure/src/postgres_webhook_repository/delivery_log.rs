use super::*;

impl PostgresWebhookRepository {
    pub(super) async fn append_attempt_impl(&self, attempt: WebhookDeliveryAttempt) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_delivery_attempts (
                id,
                subscription_id,
                tenant_id,
                topic,
                payload,
                delivery_url,
                http_status,
                response_body,
                error_message,
                attempt,
                success,
                is_test,
                processing_time_ms,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.subscription_id.as_uuid())
        .bind(attempt.tenant_id.as_uuid())
        .bind(attempt.topic.as_str())
        .bind(&attempt.payload)
        .bind(attempt.delivery_url.as_str())
        .bind(attempt.http_status.and_then(|status| i16::try_from(status).ok()))
        .bind(attempt.response_body.as_deref())
        .bind(attempt.error_message.as_deref())
        .bind(i32::try_from(attempt.attempt).unwrap_or(i32::MAX))
        .bind(attempt.success)
        .bind(attempt.is_test)
        .bind(i64::try_from(attempt.processing_time_ms).unwrap_or(i64::MAX))
        .bind(attempt.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append webhook delivery attempt '{}': {error}",
                attempt.id
            ))
        })?;

        Ok(())
    }

    pub(super) async fn list_attempts_impl(
        &self,
        tenant_id: TenantId,
        subscription_id: SubscriptionId,
        query: DeliveryAttemptQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        let query = query.normalized();
        let rows = sqlx::query_as::<_, WebhookDeliveryAttemptRow>(
            r#"
            SELECT
                id,
                subscription_id,
                tenant_id,
                topic,
                payload,
                delivery_url,
                http_status,
                response_body,
                error_message,
                attempt,
                success,
                is_test,
                processing_time_ms,
                created_at
            FROM webhook_delivery_attempts
            WHERE tenant_id = $1 AND subscription_id = $2
            ORDER BY created_at DESC, attempt DESC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subscription_id.as_uuid())
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list webhook delivery attempts for '{subscription_id}': {error}"
            ))
        })?;

        rows.into_iter().map(attempt_from_row).collect()
    }
}

fn attempt_from_row(row: WebhookDeliveryAttemptRow) -> AppResult<WebhookDeliveryAttempt> {
    Ok(WebhookDeliveryAttempt {
        id: row.id,
        subscription_id: SubscriptionId::from_uuid(row.subscription_id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        topic: row.topic,
        payload: row.payload,
        delivery_url: row.delivery_url,
        http_status: row
            .http_status
            .map(|status| integer_column(status, "http_status"))
            .transpose()?,
        response_body: row.response_body,
        error_message: row.error_message,
        attempt: integer_column(row.attempt, "attempt")?,
        success: row.success,
        is_test: row.is_test,
        processing_time_ms: integer_column(row.processing_time_ms, "processing_time_ms")?,
        timestamp: row.created_at,
    })
}
