use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use fieldops_application::{DEFAULT_WEBHOOK_USER_AGENT, WebhookDeliveryConfig};
use fieldops_core::AppError;
use fieldops_domain::DEFAULT_WEBHOOK_DISABLE_THRESHOLD;
use tracing_subscriber::EnvFilter;

const MIN_INTERNAL_API_TOKEN_CHARS: usize = 32;
const DEFAULT_WEBHOOK_BACKOFF_BASE_MS: u64 = 1_000;

/// Backing store for subscriptions and delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookStoreConfig {
    Postgres {
        database_url: String,
        secret_encryption_key: String,
    },
    Memory,
}

impl WebhookStoreConfig {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub store: WebhookStoreConfig,
    pub api_host: String,
    pub api_port: u16,
    pub internal_api_token: String,
    pub disable_threshold: u32,
    pub backoff_base_ms: u64,
    pub user_agent: String,
    pub seed_file: Option<String>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let store = match env::var("WEBHOOK_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => WebhookStoreConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
                secret_encryption_key: required_non_empty_env("WEBHOOK_SECRET_ENCRYPTION_KEY")?,
            },
            "memory" => WebhookStoreConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "WEBHOOK_STORE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        if migrate_only && store == WebhookStoreConfig::Memory {
            return Err(AppError::Validation(
                "the migrate command requires WEBHOOK_STORE=postgres".to_owned(),
            ));
        }

        let internal_api_token = required_env("INTERNAL_API_TOKEN")?;
        validate_internal_api_token(internal_api_token.as_str())?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let disable_threshold =
            parse_env_or("WEBHOOK_DISABLE_THRESHOLD", DEFAULT_WEBHOOK_DISABLE_THRESHOLD)?;
        if disable_threshold == 0 {
            return Err(AppError::Validation(
                "WEBHOOK_DISABLE_THRESHOLD must be at least 1".to_owned(),
            ));
        }
        let backoff_base_ms = parse_env_or("WEBHOOK_BACKOFF_BASE_MS", DEFAULT_WEBHOOK_BACKOFF_BASE_MS)?;
        let user_agent = env::var("WEBHOOK_USER_AGENT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WEBHOOK_USER_AGENT.to_owned());

        let seed_file = env::var("WEBHOOK_SEED_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Ok(Self {
            migrate_only,
            store,
            api_host,
            api_port,
            internal_api_token,
            disable_threshold,
            backoff_base_ms,
            user_agent,
            seed_file,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    pub fn delivery_config(&self) -> WebhookDeliveryConfig {
        WebhookDeliveryConfig::new(
            self.disable_threshold,
            Duration::from_millis(self.backoff_base_ms),
            self.user_agent.clone(),
        )
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn validate_internal_api_token(token: &str) -> Result<(), AppError> {
    if token.trim().chars().count() < MIN_INTERNAL_API_TOKEN_CHARS {
        return Err(AppError::Validation(format!(
            "INTERNAL_API_TOKEN must be at least {MIN_INTERNAL_API_TOKEN_CHARS} characters"
        )));
    }

    Ok(())
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        _ => Ok(default),
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
