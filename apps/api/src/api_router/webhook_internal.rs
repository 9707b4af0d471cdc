use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use crate::state::AppState;
use crate::{handlers, middleware};

pub(super) fn build_webhook_internal_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/internal/tenants/{tenant_id}/events",
            post(handlers::webhooks::trigger_event_handler),
        )
        .route(
            "/api/internal/tenants/{tenant_id}/webhooks/{subscription_id}/test",
            post(handlers::webhooks::test_webhook_handler),
        )
        .route(
            "/api/internal/tenants/{tenant_id}/webhooks/{subscription_id}/deliveries",
            get(handlers::webhooks::list_delivery_attempts_handler),
        )
        .route_layer(from_fn_with_state(
            app_state,
            middleware::require_internal_auth,
        ))
}
