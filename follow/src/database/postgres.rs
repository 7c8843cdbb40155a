use async_trait::async_trait;
use common::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use super::{FollowRepo, FollowRow, SORTABLE_COLUMNS};

pub struct PgFollowRepo {
    db: PgPool,
}

impl PgFollowRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn page(
        &self,
        filter_column: &str,
        user_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)> {
        // The sort column and direction come from a whitelist, never from
        // the caller's raw input.
        let order = request.sort.column(SORTABLE_COLUMNS)?;
        let direction = request.sort.direction.as_sql();

        let rows = sqlx::query_as::<_, FollowRow>(&format!(
            "SELECT id, follower_id, followed_id, created_at FROM follows \
             WHERE {filter_column} = $1 ORDER BY {order} {direction} LIMIT $2 OFFSET $3",
        ))
        .bind(user_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM follows WHERE {filter_column} = $1",
        ))
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok((rows, total as u64))
    }
}

#[async_trait]
impl FollowRepo for PgFollowRepo {
    async fn insert(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> anyhow::Result<Option<FollowRow>> {
        let row = sqlx::query_as::<_, FollowRow>(
            "INSERT INTO follows (id, follower_id, followed_id) VALUES ($1, $2, $3) \
             ON CONFLICT (follower_id, followed_id) DO NOTHING \
             RETURNING id, follower_id, followed_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn delete(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> anyhow::Result<Option<FollowRow>> {
        let row = sqlx::query_as::<_, FollowRow>(
            "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2 \
             RETURNING id, follower_id, followed_id, created_at",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn exists(&self, follower_id: Uuid, followed_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    async fn followers(
        &self,
        followed_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)> {
        self.page("followed_id", followed_id, request).await
    }

    async fn following(
        &self,
        follower_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)> {
        self.page("follower_id", follower_id, request).await
    }
}
