use std::collections::BTreeMap;

use fieldops_core::{AppError, AppResult, SubscriptionId, TenantId};
use fieldops_domain::{
    WebhookSecret, WebhookSubscription, WebhookSubscriptionInput, WebhookTopic,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api_services::WebhookStore;

const DEFAULT_SEED_API_VERSION: &str = "v1";
const DEFAULT_SEED_MAX_RETRIES: u8 = 3;
const DEFAULT_SEED_TIMEOUT_MS: u32 = 10_000;

/// One subscription fixture read from `WEBHOOK_SEED_FILE`.
#[derive(Debug, Deserialize)]
struct SeedSubscription {
    id: Uuid,
    tenant_id: Uuid,
    owner_user_id: String,
    name: String,
    delivery_url: String,
    #[serde(default = "default_enabled")]
    is_enabled: bool,
    topics: Vec<WebhookTopic>,
    #[serde(default = "default_api_version")]
    api_version: String,
    secret: Option<String>,
    #[serde(default = "default_max_retries")]
    max_retries: u8,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u32,
    #[serde(default)]
    custom_headers: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_api_version() -> String {
    DEFAULT_SEED_API_VERSION.to_owned()
}

fn default_max_retries() -> u8 {
    DEFAULT_SEED_MAX_RETRIES
}

fn default_timeout_ms() -> u32 {
    DEFAULT_SEED_TIMEOUT_MS
}

impl SeedSubscription {
    fn into_subscription(self) -> AppResult<WebhookSubscription> {
        let secret = self.secret.map(WebhookSecret::new).transpose()?;

        WebhookSubscription::new(WebhookSubscriptionInput {
            id: SubscriptionId::from_uuid(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            owner_user_id: self.owner_user_id,
            name: self.name,
            delivery_url: self.delivery_url,
            is_enabled: self.is_enabled,
            topics: self.topics,
            api_version: self.api_version,
            secret,
            last_triggered_at: None,
            failure_count: 0,
            max_retries: self.max_retries,
            timeout_ms: self.timeout_ms,
            custom_headers: self.custom_headers,
        })
    }
}

/// Loads subscription fixtures into the configured store.
pub async fn run(store: &WebhookStore, seed_file: &str) -> AppResult<usize> {
    let contents = std::fs::read_to_string(seed_file).map_err(|error| {
        AppError::Validation(format!("failed to read WEBHOOK_SEED_FILE '{seed_file}': {error}"))
    })?;
    let subscriptions = parse_seed(contents.as_str())?;
    let seeded = subscriptions.len();

    for subscription in subscriptions {
        info!(
            tenant_id = %subscription.tenant_id(),
            subscription_id = %subscription.id(),
            "seeding webhook subscription"
        );
        store.save_subscription(subscription).await?;
    }

    Ok(seeded)
}

fn parse_seed(contents: &str) -> AppResult<Vec<WebhookSubscription>> {
    let records: Vec<SeedSubscription> = serde_json::from_str(contents)
        .map_err(|error| AppError::Validation(format!("invalid webhook seed file: {error}")))?;

    records
        .into_iter()
        .map(SeedSubscription::into_subscription)
        .collect()
}
