use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::pagination::PageRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::{MemoryDeviceTokenRepo, MemoryNotificationRepo};
pub use postgres::{PgDeviceTokenRepo, PgNotificationRepo};

pub const SORTABLE_COLUMNS: &[(&str, &'static str)] = &[("createdAt", "created_at")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    Welcome,
    Follow,
    Tweet,
    Like,
    Comment,
}

/// A notification about to be written, keyed for idempotency by
/// (event id, recipient).
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub event_id: String,
    pub tweet_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub event_id: String,
    pub tweet_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Which notifications a bulk delete touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFilter {
    All,
    Read,
    Unread,
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    /// Bulk insert, skipping any (event, recipient) pair already present.
    /// Returns only the rows actually written, so redeliveries produce no
    /// duplicate pushes.
    async fn insert_many(
        &self,
        notifications: &[NewNotification],
    ) -> anyhow::Result<Vec<NotificationRow>>;

    async fn page_by_recipient(
        &self,
        recipient_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<NotificationRow>, u64)>;

    async fn unread_count(&self, recipient_id: Uuid) -> anyhow::Result<u64>;

    /// Mark one notification read. Returns false when it does not exist or
    /// belongs to someone else.
    async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> anyhow::Result<bool>;

    async fn mark_all_read(&self, recipient_id: Uuid) -> anyhow::Result<u64>;

    async fn delete(&self, recipient_id: Uuid, id: Uuid) -> anyhow::Result<bool>;

    async fn delete_many(&self, recipient_id: Uuid, filter: DeleteFilter) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait DeviceTokenRepo: Send + Sync {
    /// Register a push token for a user. A token already registered to a
    /// different user moves to the new one.
    async fn register(&self, user_id: Uuid, token: &str) -> anyhow::Result<()>;

    /// Returns false when the user holds no such token.
    async fn unregister(&self, user_id: Uuid, token: &str) -> anyhow::Result<bool>;

    async fn tokens_for(&self, user_id: Uuid) -> anyhow::Result<Vec<String>>;
}
