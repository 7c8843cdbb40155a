//! In-memory timeline store for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use common::pagination::{Direction, PageRequest};
use uuid::Uuid;

use super::{EntryRow, NewEntry, TimelineRepo, SORTABLE_COLUMNS};

#[derive(Default)]
pub struct MemoryTimelineRepo {
    rows: Mutex<Vec<EntryRow>>,
}

impl MemoryTimelineRepo {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EntryRow>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[async_trait]
impl TimelineRepo for MemoryTimelineRepo {
    async fn insert_many(&self, entries: &[NewEntry]) -> anyhow::Result<u64> {
        let mut rows = self.lock();
        let mut written = 0;

        for entry in entries {
            if rows
                .iter()
                .any(|r| r.owner_id == entry.owner_id && r.tweet_id == entry.tweet_id)
            {
                continue;
            }
            rows.push(EntryRow {
                id: Uuid::new_v4(),
                owner_id: entry.owner_id,
                tweet_id: entry.tweet_id,
                author_id: entry.author_id,
                tweet_created_at: entry.tweet_created_at,
            });
            written += 1;
        }

        Ok(written)
    }

    async fn delete_by_owner_and_author(
        &self,
        owner_id: Uuid,
        author_id: Uuid,
    ) -> anyhow::Result<u64> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|r| !(r.owner_id == owner_id && r.author_id == author_id));
        Ok((before - rows.len()) as u64)
    }

    async fn page_by_owner(
        &self,
        owner_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<EntryRow>, u64)> {
        request.sort.column(SORTABLE_COLUMNS)?;

        let mut rows: Vec<EntryRow> = self
            .lock()
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| match request.sort.direction {
            Direction::Asc => a.tweet_created_at.cmp(&b.tweet_created_at),
            Direction::Desc => b.tweet_created_at.cmp(&a.tweet_created_at),
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
