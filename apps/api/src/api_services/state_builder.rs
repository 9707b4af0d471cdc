use std::sync::Arc;

use fieldops_application::{
    WebhookDeliveryConfig, WebhookDeliveryLog, WebhookService, WebhookSubscriptionRepository,
    WebhookTransport,
};
use fieldops_core::AppResult;
use fieldops_domain::WebhookSubscription;
use fieldops_infrastructure::{
    AesSecretEncryptor, HttpWebhookTransport, InMemoryWebhookRepository, PostgresWebhookRepository,
};
use sqlx::PgPool;

use crate::api_config::{ApiConfig, WebhookStoreConfig};
use crate::state::AppState;

use super::connect_and_migrate;

/// Subscription store plus delivery log selected at startup.
#[derive(Clone)]
pub enum WebhookStore {
    Postgres(Arc<PostgresWebhookRepository>, PgPool),
    Memory(Arc<InMemoryWebhookRepository>),
}

impl WebhookStore {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Postgres(..) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    pub fn postgres_pool(&self) -> Option<PgPool> {
        match self {
            Self::Postgres(_, pool) => Some(pool.clone()),
            Self::Memory(_) => None,
        }
    }

    pub async fn save_subscription(&self, subscription: WebhookSubscription) -> AppResult<()> {
        match self {
            Self::Postgres(repository, _) => repository.save_subscription(&subscription).await,
            Self::Memory(repository) => {
                repository.insert_subscription(subscription).await;
                Ok(())
            }
        }
    }

    fn subscription_repository(&self) -> Arc<dyn WebhookSubscriptionRepository> {
        match self {
            Self::Postgres(repository, _) => repository.clone(),
            Self::Memory(repository) => repository.clone(),
        }
    }

    fn delivery_log(&self) -> Arc<dyn WebhookDeliveryLog> {
        match self {
            Self::Postgres(repository, _) => repository.clone(),
            Self::Memory(repository) => repository.clone(),
        }
    }
}

/// Connects the configured store; the postgres store also applies migrations.
pub async fn build_webhook_store(config: &ApiConfig) -> AppResult<WebhookStore> {
    match &config.store {
        WebhookStoreConfig::Postgres {
            database_url,
            secret_encryption_key,
        } => {
            let pool = connect_and_migrate(database_url.as_str()).await?;
            let secret_encryptor = Arc::new(AesSecretEncryptor::from_hex(
                secret_encryption_key.as_str(),
            )?);
            let repository = Arc::new(PostgresWebhookRepository::new(
                pool.clone(),
                secret_encryptor,
            ));
            Ok(WebhookStore::Postgres(repository, pool))
        }
        WebhookStoreConfig::Memory => Ok(WebhookStore::Memory(Arc::new(
            InMemoryWebhookRepository::new(),
        ))),
    }
}

pub fn build_app_state(config: &ApiConfig, store: &WebhookStore) -> AppResult<AppState> {
    let transport: Arc<dyn WebhookTransport> = Arc::new(HttpWebhookTransport::new(
        HttpWebhookTransport::build_client()?,
    ));

    Ok(assemble_app_state(
        store,
        transport,
        config.delivery_config(),
        config.internal_api_token.clone(),
    ))
}

pub(crate) fn assemble_app_state(
    store: &WebhookStore,
    transport: Arc<dyn WebhookTransport>,
    delivery_config: WebhookDeliveryConfig,
    internal_api_token: String,
) -> AppState {
    let webhook_service = WebhookService::new(
        store.subscription_repository(),
        store.delivery_log(),
        transport,
    )
    .with_delivery_config(delivery_config);

    AppState {
        webhook_service,
        internal_api_token,
        postgres_pool: store.postgres_pool(),
        store_label: store.label(),
    }
}
