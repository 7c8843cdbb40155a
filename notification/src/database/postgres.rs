use async_trait::async_trait;
use common::pagination::PageRequest;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use super::{
    DeleteFilter, DeviceTokenRepo, NewNotification, NotificationRepo, NotificationRow,
    SORTABLE_COLUMNS,
};

// Postgres caps bind parameters at 65535; 7 binds per row.
const INSERT_CHUNK: usize = 500;

const RETURNING: &str = " RETURNING id, recipient_id, actor_id, kind, event_id, tweet_id, \
                         comment_id, message, is_read, created_at";

pub struct PgNotificationRepo {
    db: PgPool,
}

impl PgNotificationRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationRepo for PgNotificationRepo {
    async fn insert_many(
        &self,
        notifications: &[NewNotification],
    ) -> anyhow::Result<Vec<NotificationRow>> {
        let mut written = Vec::with_capacity(notifications.len());

        for chunk in notifications.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO notifications \
                 (id, recipient_id, actor_id, kind, event_id, tweet_id, comment_id, message) ",
            );
            builder.push_values(chunk, |mut row, notification| {
                row.push_bind(Uuid::new_v4())
                    .push_bind(notification.recipient_id)
                    .push_bind(notification.actor_id)
                    .push_bind(notification.kind)
                    .push_bind(&notification.event_id)
                    .push_bind(notification.tweet_id)
                    .push_bind(notification.comment_id)
                    .push_bind(&notification.message);
            });
            builder.push(" ON CONFLICT (event_id, recipient_id) DO NOTHING");
            builder.push(RETURNING);

            written.extend(
                builder
                    .build_query_as::<NotificationRow>()
                    .fetch_all(&self.db)
                    .await?,
            );
        }

        Ok(written)
    }

    async fn page_by_recipient(
        &self,
        recipient_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<NotificationRow>, u64)> {
        let order = request.sort.column(SORTABLE_COLUMNS)?;
        let direction = request.sort.direction.as_sql();

        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT id, recipient_id, actor_id, kind, event_id, tweet_id, comment_id, message, \
             is_read, created_at FROM notifications \
             WHERE recipient_id = $1 ORDER BY {order} {direction} LIMIT $2 OFFSET $3",
        ))
        .bind(recipient_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
                .bind(recipient_id)
                .fetch_one(&self.db)
                .await?;

        Ok((rows, total as u64))
    }

    async fn unread_count(&self, recipient_id: Uuid) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(recipient_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count as u64)
    }

    async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1 AND recipient_id = $2")
                .bind(id)
                .bind(recipient_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(recipient_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, recipient_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, recipient_id: Uuid, filter: DeleteFilter) -> anyhow::Result<u64> {
        let sql = match filter {
            DeleteFilter::All => "DELETE FROM notifications WHERE recipient_id = $1",
            DeleteFilter::Read => "DELETE FROM notifications WHERE recipient_id = $1 AND is_read",
            DeleteFilter::Unread => {
                "DELETE FROM notifications WHERE recipient_id = $1 AND NOT is_read"
            }
        };

        let result = sqlx::query(sql).bind(recipient_id).execute(&self.db).await?;
        Ok(result.rows_affected())
    }
}

pub struct PgDeviceTokenRepo {
    db: PgPool,
}

impl PgDeviceTokenRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeviceTokenRepo for PgDeviceTokenRepo {
    async fn register(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO device_tokens (id, user_id, token) VALUES ($1, $2, $3) \
             ON CONFLICT (token) DO UPDATE SET user_id = EXCLUDED.user_id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn unregister(&self, user_id: Uuid, token: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE user_id = $1 AND token = $2")
            .bind(user_id)
            .bind(token)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn tokens_for(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        let tokens =
            sqlx::query_scalar("SELECT token FROM device_tokens WHERE user_id = $1 ORDER BY created_at")
                .bind(user_id)
                .fetch_all(&self.db)
                .await?;

        Ok(tokens)
    }
}
