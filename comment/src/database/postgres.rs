use async_trait::async_trait;
use common::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use super::{CommentRepo, CommentRow, NewComment, SORTABLE_COLUMNS};

const COLUMNS: &str = "id, tweet_id, user_id, parent_id, kind, content, created_at, updated_at";

pub struct PgCommentRepo {
    db: PgPool,
}

impl PgCommentRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn page(
        &self,
        filter: &str,
        key: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)> {
        let order = request.sort.column(SORTABLE_COLUMNS)?;
        let direction = request.sort.direction.as_sql();

        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COLUMNS} FROM comments WHERE {filter} \
             ORDER BY {order} {direction} LIMIT $2 OFFSET $3",
        ))
        .bind(key)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM comments WHERE {filter}"))
            .bind(key)
            .fetch_one(&self.db)
            .await?;

        Ok((rows, total as u64))
    }
}

#[async_trait]
impl CommentRepo for PgCommentRepo {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<CommentRow> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO comments (id, tweet_id, user_id, parent_id, kind, content) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}",
        ))
        .bind(Uuid::new_v4())
        .bind(comment.tweet_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .bind(comment.kind)
        .bind(&comment.content)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    async fn by_id(&self, id: Uuid) -> anyhow::Result<Option<CommentRow>> {
        let row =
            sqlx::query_as::<_, CommentRow>(&format!("SELECT {COLUMNS} FROM comments WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok(row)
    }

    async fn update_content(&self, id: Uuid, content: &str) -> anyhow::Result<Option<CommentRow>> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "UPDATE comments SET content = $2, updated_at = now() WHERE id = $1 RETURNING {COLUMNS}",
        ))
        .bind(id)
        .bind(content)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn delete_tree(&self, id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "WITH RECURSIVE doomed AS ( \
                 SELECT id FROM comments WHERE id = $1 \
                 UNION ALL \
                 SELECT c.id FROM comments c JOIN doomed d ON c.parent_id = d.id \
             ) \
             DELETE FROM comments WHERE id IN (SELECT id FROM doomed) RETURNING id",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }

    async fn page_top_level(
        &self,
        tweet_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)> {
        self.page("tweet_id = $1 AND parent_id IS NULL", tweet_id, request)
            .await
    }

    async fn page_replies(
        &self,
        parent_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)> {
        self.page("parent_id = $1", parent_id, request).await
    }
}
