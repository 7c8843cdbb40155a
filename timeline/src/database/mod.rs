use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::pagination::PageRequest;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryTimelineRepo;
pub use postgres::PgTimelineRepo;

pub const SORTABLE_COLUMNS: &[(&str, &'static str)] = &[("createdAt", "tweet_created_at")];

/// An entry waiting to be written into someone's timeline.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub owner_id: Uuid,
    pub tweet_id: Uuid,
    pub author_id: Uuid,
    pub tweet_created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub tweet_id: Uuid,
    pub author_id: Uuid,
    pub tweet_created_at: DateTime<Utc>,
}

#[async_trait]
pub trait TimelineRepo: Send + Sync {
    /// Bulk insert; entries whose (owner, tweet) pair already exists are
    /// skipped. Returns how many rows were actually written.
    async fn insert_many(&self, entries: &[NewEntry]) -> anyhow::Result<u64>;

    /// Remove every entry `owner_id` holds for tweets authored by
    /// `author_id`. Returns the number of rows removed.
    async fn delete_by_owner_and_author(
        &self,
        owner_id: Uuid,
        author_id: Uuid,
    ) -> anyhow::Result<u64>;

    async fn page_by_owner(
        &self,
        owner_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<EntryRow>, u64)>;
}
