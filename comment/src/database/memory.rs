//! In-memory comment store for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use common::pagination::{Direction, PageRequest};
use uuid::Uuid;

use super::{CommentRepo, CommentRow, NewComment, SORTABLE_COLUMNS};

#[derive(Default)]
pub struct MemoryCommentRepo {
    rows: Mutex<Vec<CommentRow>>,
}

impl MemoryCommentRepo {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CommentRow>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn page(
        &self,
        request: &PageRequest,
        filter: impl Fn(&CommentRow) -> bool,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)> {
        request.sort.column(SORTABLE_COLUMNS)?;

        let mut rows: Vec<CommentRow> = self.lock().iter().filter(|r| filter(r)).cloned().collect();
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
impl CommentRepo for MemoryCommentRepo {
    async fn insert(&self, comment: NewComment) -> anyhow::Result<CommentRow> {
        let now = Utc::now();
        let row = CommentRow {
            id: Uuid::new_v4(),
            tweet_id: comment.tweet_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            kind: comment.kind,
            content: comment.content,
            created_at: now,
            updated_at: now,
        };
        self.lock().push(row.clone());
        Ok(row)
    }

    async fn by_id(&self, id: Uuid) -> anyhow::Result<Option<CommentRow>> {
        Ok(self.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn update_content(&self, id: Uuid, content: &str) -> anyhow::Result<Option<CommentRow>> {
        let mut rows = self.lock();
        match rows.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.content = content.to_string();
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_tree(&self, id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let mut rows = self.lock();
        if !rows.iter().any(|r| r.id == id) {
            return Ok(Vec::new());
        }

        // Breadth-first walk down the reply tree.
        let mut doomed = vec![id];
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            let next: Vec<Uuid> = rows
                .iter()
                .filter(|r| r.parent_id.is_some_and(|p| frontier.contains(&p)))
                .map(|r| r.id)
                .collect();
            doomed.extend(&next);
            frontier = next;
        }

        rows.retain(|r| !doomed.contains(&r.id));
        Ok(doomed)
    }

    async fn page_top_level(
        &self,
        tweet_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)> {
        self.page(request, |r| r.tweet_id == tweet_id && r.parent_id.is_none())
    }

    async fn page_replies(
        &self,
        parent_id: Uuid,
        request: &PageRequest,
    ) -> anyhow::Result<(Vec<CommentRow>, u64)> {
        self.page(request, |r| r.parent_id == Some(parent_id))
    }
}
