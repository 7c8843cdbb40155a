//! In-memory follow store for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use common::pagination::{Direction, PageRequest};
use uuid::Uuid;

use super::{FollowRepo, FollowRow, SORTABLE_COLUMNS};

#[derive(Default)]
pub struct MemoryFollowRepo {
    rows: Mutex<Vec<FollowRow>>,
}

impl MemoryFollowRepo {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FollowRow>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn page(
        &self,
        request: &PageRequest,
        filter: impl Fn(&FollowRow) -> bool,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)> {
        request.sort.column(SORTABLE_COLUMNS)?;

        let mut rows: Vec<FollowRow> = self.lock().iter().filter(|r| filter(r)).cloned().collect();
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
}

#[async_trait]
impl FollowRepo for MemoryFollowRepo {
    async fn insert(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> anyhow::Result<Option<FollowRow>> {
        let mut rows = self.lock();
        if rows
            .iter()
            .any(|r| r.follower_id == follower_id && r.followed_id == followed_id)
        {
            return Ok(None);
        }

        let row = FollowRow {
            id: Uuid::new_v4(),
            follower_id,
            followed_id,
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn delete(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> anyhow::Result<Option<FollowRow>> {
        let mut rows = self.lock();
        let position = rows
            .iter()
            .position(|r| r.follower_id == follower_id && r.followed_id == followed_id);
        Ok(position.map(|i| rows.remove(i)))
    }

    async fn exists(&self, follower_id: Uuid, followed_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .lock()
            .iter()
            .any(|r| r.follower_id == follower_id && r.followed_id == followed_id))
    }

    async fn followers(
        &self,
        followed_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)> {
        self.page(request, |r| r.followed_id == followed_id)
    }

    async fn following(
        &self,
        follower_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<FollowRow>, u64)> {
        self.page(request, |r| r.follower_id == follower_id)
    }
}
