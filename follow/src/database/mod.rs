use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::pagination::PageRequest;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryFollowRepo;
pub use postgres::PgFollowRepo;

/// Caller-facing sort fields mapped to their columns.
pub const SORTABLE_COLUMNS: &[(&str, &'static str)] = &[("createdAt", "created_at")];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowRow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<FollowRow> for common::clients::Follow {
    fn from(row: FollowRow) -> Self {
        Self {
            id: row.id,
            follower_id: row.follower_id,
            followed_id: row.followed_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
pub trait FollowRepo: Send + Sync {
    /// Insert the edge. Returns `None` when it already exists; the unique
    /// index makes this race-free.
    async fn insert(&self, follower_id: Uuid, followed_id: Uuid)
        -> anyhow::Result<Option<FollowRow>>;

    /// Delete the edge, returning the removed row when it existed.
    async fn delete(&self, follower_id: Uuid, followed_id: Uuid)
        -> anyhow::Result<Option<FollowRow>>;

    async fn exists(&self, follower_id: Uuid, followed_id: Uuid) -> anyhow::Result<bool>;

    /// One page of everyone following `followed_id`, with the total edge
    /// count.
    async fn followers(
        &self,
        followed_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)>;

    /// One page of everyone `follower_id` follows, with the total edge count.
    async fn following(
        &self,
        follower_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)>;
}
