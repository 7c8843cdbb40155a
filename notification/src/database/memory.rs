//! In-memory notification stores for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use common::pagination::{Direction, PageRequest};
use uuid::Uuid;

use super::{
    DeleteFilter, DeviceTokenRepo, NewNotification, NotificationRepo, NotificationRow,
    SORTABLE_COLUMNS,
};

#[derive(Default)]
pub struct MemoryNotificationRepo {
    rows: Mutex<Vec<NotificationRow>>,
}

impl MemoryNotificationRepo {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<NotificationRow>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn all(&self) -> Vec<NotificationRow> {
        self.lock().clone()
    }
}

#[async_trait]
impl NotificationRepo for MemoryNotificationRepo {
    async fn insert_many(
        &self,
        notifications: &[NewNotification],
    ) -> anyhow::Result<Vec<NotificationRow>> {
        let mut rows = self.lock();
        let mut written = Vec::new();

        for notification in notifications {
            if rows.iter().any(|r| {
                r.event_id == notification.event_id && r.recipient_id == notification.recipient_id
            }) {
                continue;
            }

            let row = NotificationRow {
                id: Uuid::new_v4(),
                recipient_id: notification.recipient_id,
                actor_id: notification.actor_id,
                kind: notification.kind,
                event_id: notification.event_id.clone(),
                tweet_id: notification.tweet_id,
                comment_id: notification.comment_id,
                message: notification.message.clone(),
                is_read: false,
                created_at: Utc::now(),
            };
            rows.push(row.clone());
            written.push(row);
        }

        Ok(written)
    }

    async fn page_by_recipient(
        &self,
        recipient_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<NotificationRow>, u64)> {
        request.sort.column(SORTABLE_COLUMNS)?;

        let mut rows: Vec<NotificationRow> = self
            .lock()
            .iter()
            .filter(|r| r.recipient_id == recipient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| match request.sort.direction {
            Direction::Asc => a.created_at.cmp(&b.created_at),
            Direction::Desc => b.created_at.cmp(&a.created_at),
        });

        let total = rows.len() as u64;
        let rows = rows
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit() as usize)
            .collect();

        Ok((rows, total))
    }

    async fn unread_count(&self, recipient_id: Uuid) -> anyhow::Result<u64> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| r.recipient_id == recipient_id && !r.is_read)
            .count() as u64)
    }

    async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.lock();
        match rows
            .iter_mut()
            .find(|r| r.id == id && r.recipient_id == recipient_id)
        {
            Some(row) => {
                row.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> anyhow::Result<u64> {
        let mut rows = self.lock();
        let mut updated = 0;
        for row in rows
            .iter_mut()
            .filter(|r| r.recipient_id == recipient_id && !r.is_read)
        {
            row.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, recipient_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|r| !(r.id == id && r.recipient_id == recipient_id));
        Ok(rows.len() < before)
    }

    async fn delete_many(&self, recipient_id: Uuid, filter: DeleteFilter) -> anyhow::Result<u64> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|r| {
            r.recipient_id != recipient_id
                || match filter {
                    DeleteFilter::All => false,
                    DeleteFilter::Read => !r.is_read,
                    DeleteFilter::Unread => r.is_read,
                }
        });
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryDeviceTokenRepo {
    tokens: Mutex<Vec<(Uuid, String)>>,
}

impl MemoryDeviceTokenRepo {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Uuid, String)>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DeviceTokenRepo for MemoryDeviceTokenRepo {
    async fn register(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
        let mut tokens = self.lock();
        tokens.retain(|(_, t)| t != token);
        tokens.push((user_id, token.to_string()));
        Ok(())
    }

    async fn unregister(&self, user_id: Uuid, token: &str) -> anyhow::Result<bool> {
        let mut tokens = self.lock();
        let before = tokens.len();
        tokens.retain(|(u, t)| !(*u == user_id && t == token));
        Ok(tokens.len() < before)
    }

    async fn tokens_for(&self, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        Ok(self
            .lock()
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, t)| t.clone())
            .collect())
    }
}
