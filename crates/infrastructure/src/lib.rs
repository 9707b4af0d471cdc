//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_secret_encryptor;
mod http_webhook_transport;
mod in_memory_webhook_repository;
mod postgres_webhook_repository;

pub use aes_secret_encryptor::AesSecretEncryptor;
pub use http_webhook_transport::HttpWebhookTransport;
pub use in_memory_webhook_repository::InMemoryWebhookRepository;
pub use postgres_webhook_repository::PostgresWebhookRepository;
