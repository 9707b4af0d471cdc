use std::fmt::{Display, Formatter};
use std::str::FromStr;

use fieldops_core::AppError;
use serde::{Deserialize, Serialize};

/// Topic name carried by synthetic diagnostic deliveries.
///
/// Not part of [`WebhookTopic`]: subscriptions can never match it.
pub const WEBHOOK_PING_TOPIC: &str = "webhook.ping";

/// Closed taxonomy of domain events a subscription can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WebhookTopic {
    /// A work order was created.
    WorkOrderCreated,
    /// A work order was updated.
    WorkOrderUpdated,
    /// A work order was deleted.
    WorkOrderDeleted,
    /// A work order moved to another status.
    WorkOrderStatusChanged,
    /// A task was created.
    TaskCreated,
    /// A task was updated.
    TaskUpdated,
    /// A task was deleted.
    TaskDeleted,
    /// A task moved to another status.
    TaskStatusChanged,
    /// A user was created.
    UserCreated,
    /// A user was updated.
    UserUpdated,
    /// A user was deleted.
    UserDeleted,
    /// A client was created.
    ClientCreated,
    /// A client was updated.
    ClientUpdated,
    /// A client was deleted.
    ClientDeleted,
}

impl WebhookTopic {
    /// Every topic in the taxonomy.
    pub const ALL: [Self; 14] = [
        Self::WorkOrderCreated,
        Self::WorkOrderUpdated,
        Self::WorkOrderDeleted,
        Self::WorkOrderStatusChanged,
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::TaskStatusChanged,
        Self::UserCreated,
        Self::UserUpdated,
        Self::UserDeleted,
        Self::ClientCreated,
        Self::ClientUpdated,
        Self::ClientDeleted,
    ];

    /// Returns the stable wire and storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkOrderCreated => "work_order.created",
            Self::WorkOrderUpdated => "work_order.updated",
            Self::WorkOrderDeleted => "work_order.deleted",
            Self::WorkOrderStatusChanged => "work_order.status_changed",
            Self::TaskCreated => "task.created",
            Self::TaskUpdated => "task.updated",
            Self::TaskDeleted => "task.deleted",
            Self::TaskStatusChanged => "task.status_changed",
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::UserDeleted => "user.deleted",
            Self::ClientCreated => "client.created",
            Self::ClientUpdated => "client.updated",
            Self::ClientDeleted => "client.deleted",
        }
    }

    /// Parses a stored or transported topic value.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown webhook topic '{value}'")))
    }
}

impl Display for WebhookTopic {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for WebhookTopic {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for WebhookTopic {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<WebhookTopic> for String {
    fn from(value: WebhookTopic) -> Self {
        value.as_str().to_owned()
    }
}
