use fieldops_application::WebhookService;
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub webhook_service: WebhookService,
    pub internal_api_token: String,
    pub postgres_pool: Option<PgPool>,
    pub store_label: &'static str,
}
