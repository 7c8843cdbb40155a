use async_trait::async_trait;
use common::pagination::PageRequest;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use super::{EntryRow, NewEntry, TimelineRepo, SORTABLE_COLUMNS};

// Postgres caps bind parameters at 65535; 5 binds per row.
const INSERT_CHUNK: usize = 1000;

pub struct PgTimelineRepo {
    db: PgPool,
}

impl PgTimelineRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TimelineRepo for PgTimelineRepo {
    async fn insert_many(&self, entries: &[NewEntry]) -> anyhow::Result<u64> {
        let mut written = 0;

        for chunk in entries.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO timeline_entries (id, owner_id, tweet_id, author_id, tweet_created_at) ",
            );
            builder.push_values(chunk, |mut row, entry| {
                row.push_bind(Uuid::new_v4())
                    .push_bind(entry.owner_id)
                    .push_bind(entry.tweet_id)
                    .push_bind(entry.author_id)
                    .push_bind(entry.tweet_created_at);
            });
            builder.push(" ON CONFLICT (owner_id, tweet_id) DO NOTHING");

            written += builder.build().execute(&self.db).await?.rows_affected();
        }

        Ok(written)
    }

    async fn delete_by_owner_and_author(
        &self,
        owner_id: Uuid,
        author_id: Uuid,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM timeline_entries WHERE owner_id = $1 AND author_id = $2")
            .bind(owner_id)
            .bind(author_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn page_by_owner(
        &self,
        owner_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<EntryRow>, u64)> {
        let order = request.sort.column(SORTABLE_COLUMNS)?;
        let direction = request.sort.direction.as_sql();

        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT id, owner_id, tweet_id, author_id, tweet_created_at FROM timeline_entries \
             WHERE owner_id = $1 ORDER BY {order} {direction} LIMIT $2 OFFSET $3",
        ))
        .bind(owner_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timeline_entries WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.db)
            .await?;

        Ok((rows, total as u64))
    }
}
