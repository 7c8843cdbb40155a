use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::pagination::PageRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryCommentRepo;
pub use postgres::PgCommentRepo;

pub const SORTABLE_COLUMNS: &[(&str, &'static str)] = &[("createdAt", "created_at")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "comment_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CommentKind {
    Parent,
    Reply,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: CommentKind,
    pub content: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: CommentKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<CommentRow>;

    async fn by_id(&self, id: Uuid) -> anyhow::Result<Option<CommentRow>>;

    async fn update_content(&self, id: Uuid, content: &str) -> anyhow::Result<Option<CommentRow>>;

    /// Delete the comment and its whole reply subtree in one statement.
    /// Returns every removed id, the root included.
    async fn delete_tree(&self, id: Uuid) -> anyhow::Result<Vec<Uuid>>;

    async fn page_top_level(
        &self,
        tweet_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)>;

    async fn page_replies(
        &self,
        parent_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)>;
}
