use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use fieldops_core::{SubscriptionId, TenantId};
use fieldops_domain::WebhookTopic;
use tracing::info;
use uuid::Uuid;

use crate::dto::{
    DeliveryAttemptListQuery, TriggerWebhookEventRequest, TriggerWebhookEventResponse,
    WebhookDeliveryAttemptResponse, WebhookTestResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Accepts a domain event and starts its fan-out without waiting for
/// deliveries.
pub async fn trigger_event_handler(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<TriggerWebhookEventRequest>,
) -> ApiResult<(StatusCode, Json<TriggerWebhookEventResponse>)> {
    let tenant_id = TenantId::from_uuid(tenant_id);
    let topic = WebhookTopic::parse(payload.topic.as_str())?;

    let dispatch = state
        .webhook_service
        .trigger(tenant_id, topic, payload.data, payload.event_id);
    info!(%tenant_id, %topic, event_id = %dispatch.event_id, "webhook event accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerWebhookEventResponse {
            event_id: dispatch.event_id,
        }),
    ))
}

pub async fn test_webhook_handler(
    State(state): State<AppState>,
    Path((tenant_id, subscription_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<WebhookTestResponse>> {
    let result = state
        .webhook_service
        .test_webhook(
            TenantId::from_uuid(tenant_id),
            SubscriptionId::from_uuid(subscription_id),
        )
        .await?;

    Ok(Json(WebhookTestResponse::from(result)))
}

pub async fn list_delivery_attempts_handler(
    State(state): State<AppState>,
    Path((tenant_id, subscription_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<DeliveryAttemptListQuery>,
) -> ApiResult<Json<Vec<WebhookDeliveryAttemptResponse>>> {
    let attempts = state
        .webhook_service
        .list_delivery_attempts(
            TenantId::from_uuid(tenant_id),
            SubscriptionId::from_uuid(subscription_id),
            query.into(),
        )
        .await?;

    Ok(Json(
        attempts
            .into_iter()
            .map(WebhookDeliveryAttemptResponse::from)
            .collect(),
    ))
}
