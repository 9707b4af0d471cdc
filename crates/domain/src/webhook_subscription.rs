use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldops_core::{AppError, AppResult, NonEmptyString, SubscriptionId, TenantId};
use url::Url;

use crate::WebhookTopic;

/// Highest retry count a subscription may configure.
pub const MAX_WEBHOOK_RETRIES: u8 = 10;
/// Lower bound for the per-attempt timeout.
pub const MIN_WEBHOOK_TIMEOUT_MS: u32 = 1_000;
/// Upper bound for the per-attempt timeout.
pub const MAX_WEBHOOK_TIMEOUT_MS: u32 = 30_000;
/// Consecutive exhausted dispatches after which a subscription is paused.
pub const DEFAULT_WEBHOOK_DISABLE_THRESHOLD: u32 = 10;

/// Header carrying the hex HMAC-SHA256 signature of the body.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";
/// Header carrying the event topic.
pub const WEBHOOK_TOPIC_HEADER: &str = "x-webhook-topic";
/// Header carrying the subscription identifier.
pub const WEBHOOK_SUBSCRIPTION_ID_HEADER: &str = "x-webhook-subscription-id";
/// Header carrying the per-attempt delivery identifier.
pub const WEBHOOK_DELIVERY_ID_HEADER: &str = "x-webhook-delivery-id";
/// Header carrying the 1-based attempt number.
pub const WEBHOOK_ATTEMPT_HEADER: &str = "x-webhook-attempt";

/// Header names a tenant may never set through custom headers.
pub const RESERVED_WEBHOOK_HEADERS: [&str; 10] = [
    "content-type",
    "content-length",
    "host",
    "transfer-encoding",
    "user-agent",
    WEBHOOK_SIGNATURE_HEADER,
    WEBHOOK_TOPIC_HEADER,
    WEBHOOK_SUBSCRIPTION_ID_HEADER,
    WEBHOOK_DELIVERY_ID_HEADER,
    WEBHOOK_ATTEMPT_HEADER,
];

/// Returns whether a header name is owned by the delivery engine.
#[must_use]
pub fn is_reserved_webhook_header(name: &str) -> bool {
    RESERVED_WEBHOOK_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name.trim()))
}

/// Opaque signing key shared between Fieldops and one subscriber.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Creates a secret, rejecting empty values.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(AppError::Validation(
                "webhook secret must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the key material used for signing.
    #[must_use]
    pub fn expose_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Debug for WebhookSecret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("WebhookSecret([REDACTED])")
    }
}

/// Health classification derived from the consecutive failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookHealth {
    /// Last dispatch succeeded or no dispatch failed yet.
    Healthy,
    /// Some consecutive dispatches exhausted their retries.
    Failing {
        /// Consecutive exhausted dispatches.
        consecutive_failures: u32,
    },
    /// Paused; no dispatch reaches the subscriber until it is re-enabled.
    Disabled {
        /// Consecutive exhausted dispatches.
        consecutive_failures: u32,
    },
}

impl WebhookHealth {
    /// Classifies health counters against a disable threshold.
    #[must_use]
    pub fn classify(failure_count: u32, is_enabled: bool, disable_threshold: u32) -> Self {
        if !is_enabled || failure_count >= disable_threshold {
            return Self::Disabled {
                consecutive_failures: failure_count,
            };
        }

        if failure_count == 0 {
            Self::Healthy
        } else {
            Self::Failing {
                consecutive_failures: failure_count,
            }
        }
    }

    /// Returns stable label used in logs and API responses.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Failing { .. } => "failing",
            Self::Disabled { .. } => "disabled",
        }
    }
}

/// Tenant-registered webhook endpoint and its delivery policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscription {
    id: SubscriptionId,
    tenant_id: TenantId,
    owner_user_id: NonEmptyString,
    name: NonEmptyString,
    delivery_url: Url,
    is_enabled: bool,
    topics: BTreeSet<WebhookTopic>,
    api_version: NonEmptyString,
    secret: Option<WebhookSecret>,
    last_triggered_at: Option<DateTime<Utc>>,
    failure_count: u32,
    max_retries: u8,
    timeout_ms: u32,
    custom_headers: BTreeMap<String, String>,
}

/// Input payload used to construct a validated subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscriptionInput {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// User that registered the subscription.
    pub owner_user_id: String,
    /// Display name.
    pub name: String,
    /// Target URL, must use `https`.
    pub delivery_url: String,
    /// Enabled flag.
    pub is_enabled: bool,
    /// Subscribed topics.
    pub topics: Vec<WebhookTopic>,
    /// Payload api version stamped on deliveries.
    pub api_version: String,
    /// Signing secret, when one is configured.
    pub secret: Option<WebhookSecret>,
    /// Timestamp of the last successful dispatch.
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Consecutive exhausted dispatches.
    pub failure_count: u32,
    /// Retries after the first attempt.
    pub max_retries: u8,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u32,
    /// Extra headers applied after the reserved delivery headers.
    pub custom_headers: BTreeMap<String, String>,
}

impl WebhookSubscription {
    /// Creates a validated subscription.
    pub fn new(input: WebhookSubscriptionInput) -> AppResult<Self> {
        let WebhookSubscriptionInput {
            id,
            tenant_id,
            owner_user_id,
            name,
            delivery_url,
            is_enabled,
            topics,
            api_version,
            secret,
            last_triggered_at,
            failure_count,
            max_retries,
            timeout_ms,
            custom_headers,
        } = input;

        let delivery_url = parse_delivery_url(delivery_url.as_str())?;

        let topics: BTreeSet<WebhookTopic> = topics.into_iter().collect();
        if topics.is_empty() {
            return Err(AppError::Validation(format!(
                "webhook subscription '{id}' must subscribe to at least one topic"
            )));
        }

        if max_retries > MAX_WEBHOOK_RETRIES {
            return Err(AppError::Validation(format!(
                "max_retries must be between 0 and {MAX_WEBHOOK_RETRIES}, got {max_retries}"
            )));
        }

        if !(MIN_WEBHOOK_TIMEOUT_MS..=MAX_WEBHOOK_TIMEOUT_MS).contains(&timeout_ms) {
            return Err(AppError::Validation(format!(
                "timeout_ms must be between {MIN_WEBHOOK_TIMEOUT_MS} and {MAX_WEBHOOK_TIMEOUT_MS}, got {timeout_ms}"
            )));
        }

        for (header_name, header_value) in &custom_headers {
            validate_custom_header(header_name, header_value)?;
        }

        Ok(Self {
            id,
            tenant_id,
            owner_user_id: NonEmptyString::new(owner_user_id)?,
            name: NonEmptyString::new(name)?,
            delivery_url,
            is_enabled,
            topics,
            api_version: NonEmptyString::new(api_version)?,
            secret,
            last_triggered_at,
            failure_count,
            max_retries,
            timeout_ms,
            custom_headers,
        })
    }

    /// Returns the subscription identifier.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the registering user.
    #[must_use]
    pub fn owner_user_id(&self) -> &NonEmptyString {
        &self.owner_user_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the delivery URL.
    #[must_use]
    pub fn delivery_url(&self) -> &Url {
        &self.delivery_url
    }

    /// Returns whether dispatches reach this subscription.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    /// Returns subscribed topics.
    #[must_use]
    pub fn topics(&self) -> &BTreeSet<WebhookTopic> {
        &self.topics
    }

    /// Returns whether the subscription listens to a topic.
    #[must_use]
    pub fn is_subscribed_to(&self, topic: WebhookTopic) -> bool {
        self.topics.contains(&topic)
    }

    /// Returns the payload api version.
    #[must_use]
    pub fn api_version(&self) -> &NonEmptyString {
        &self.api_version
    }

    /// Returns the signing secret when one is configured.
    #[must_use]
    pub fn secret(&self) -> Option<&WebhookSecret> {
        self.secret.as_ref()
    }

    /// Returns the last successful dispatch timestamp.
    #[must_use]
    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    /// Returns consecutive exhausted dispatches.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Returns configured retries.
    #[must_use]
    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// Returns total attempts per dispatch (first attempt plus retries).
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        u32::from(self.max_retries) + 1
    }

    /// Returns the per-attempt timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Returns the per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Returns custom headers.
    #[must_use]
    pub fn custom_headers(&self) -> &BTreeMap<String, String> {
        &self.custom_headers
    }

    /// Returns health classification for a disable threshold.
    #[must_use]
    pub fn health(&self, disable_threshold: u32) -> WebhookHealth {
        WebhookHealth::classify(self.failure_count, self.is_enabled, disable_threshold)
    }

    /// Applies a successful dispatch: the failure streak resets.
    pub fn mark_dispatch_succeeded(&mut self, triggered_at: DateTime<Utc>) {
        self.failure_count = 0;
        self.last_triggered_at = Some(triggered_at);
    }

    /// Applies an exhausted dispatch and pauses the subscription at the threshold.
    pub fn mark_dispatch_exhausted(&mut self, disable_threshold: u32) {
        self.failure_count = self.failure_count.saturating_add(1);
        if self.failure_count >= disable_threshold.max(1) {
            self.is_enabled = false;
        }
    }
}

fn parse_delivery_url(value: &str) -> AppResult<Url> {
    let url = Url::parse(value.trim()).map_err(|error| {
        AppError::Validation(format!("invalid webhook delivery url '{value}': {error}"))
    })?;

    if url.scheme() != "https" {
        return Err(AppError::Validation(format!(
            "webhook delivery url must use https, got scheme '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::Validation(
            "webhook delivery url must include a host".to_owned(),
        ));
    }

    Ok(url)
}

fn validate_custom_header(name: &str, value: &str) -> AppResult<()> {
    let is_token = !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte));
    if !is_token {
        return Err(AppError::Validation(format!(
            "custom header name '{name}' is not a valid HTTP header name"
        )));
    }

    if is_reserved_webhook_header(name) {
        return Err(AppError::Validation(format!(
            "custom header '{name}' is reserved for webhook delivery"
        )));
    }

    if value.chars().any(|character| character.is_control()) {
        return Err(AppError::Validation(format!(
            "custom header '{name}' contains control characters"
        )));
    }

    Ok(())
}
