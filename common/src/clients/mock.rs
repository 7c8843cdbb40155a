//! In-memory collaborator doubles for tests.
//!
//! Each mock can be switched into a failing state to exercise the
//! upstream-unavailable paths.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use uuid::Uuid;

use super::{ClientError, CommentApi, CommentSummary, Follow, FollowApi, ProfileApi, Tweet, TweetApi};
use crate::pagination::{PageRequest, PageResponse, Sort};

fn unavailable() -> ClientError {
    ClientError::Unavailable("mock forced failure".to_string())
}

#[derive(Default)]
pub struct MockTweetApi {
    tweets: Mutex<HashMap<Uuid, Tweet>>,
    failing: AtomicBool,
}

impl MockTweetApi {
    pub fn insert(&self, tweet: Tweet) {
        self.tweets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tweet.id, tweet);
    }

    pub fn remove(&self, id: Uuid) {
        self.tweets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TweetApi for MockTweetApi {
    async fn tweet_by_id(&self, id: Uuid) -> Result<Option<Tweet>, ClientError> {
        self.check()?;
        Ok(self
            .tweets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned())
    }

    async fn tweets_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Tweet>, ClientError> {
        self.check()?;
        let tweets = self.tweets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(ids.iter().filter_map(|id| tweets.get(id).cloned()).collect())
    }

    async fn public_tweets(
        &self,
        author_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<Vec<Tweet>, ClientError> {
        self.check()?;
        let mut tweets: Vec<Tweet> = self
            .tweets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|tweet| tweet.user_id == author_id)
            .cloned()
            .collect();
        tweets.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let request = PageRequest::new(page, size, Sort::descending("createdAt"));
        Ok(tweets
            .into_iter()
            .skip(request.offset() as usize)
            .take(size as usize)
            .collect())
    }
}

#[derive(Default)]
pub struct MockProfileApi {
    existing: Mutex<Vec<Uuid>>,
    failing: AtomicBool,
}

impl MockProfileApi {
    pub fn add_user(&self, user_id: Uuid) {
        self.existing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(user_id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileApi for MockProfileApi {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .existing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&user_id))
    }
}

#[derive(Default)]
pub struct MockCommentApi {
    comments: Mutex<HashMap<Uuid, CommentSummary>>,
    failing: AtomicBool,
}

impl MockCommentApi {
    pub fn insert(&self, comment: CommentSummary) {
        self.comments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(comment.id, comment);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommentApi for MockCommentApi {
    async fn comment_by_id(&self, id: Uuid) -> Result<Option<CommentSummary>, ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .comments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned())
    }
}

#[derive(Default)]
pub struct MockFollowApi {
    followers: Mutex<HashMap<Uuid, Vec<Follow>>>,
    failing: AtomicBool,
}

impl MockFollowApi {
    pub fn add_follower(&self, followed_id: Uuid, follower_id: Uuid) {
        self.followers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(followed_id)
            .or_default()
            .push(Follow {
                id: Uuid::new_v4(),
                follower_id,
                followed_id,
                created_at: chrono::Utc::now(),
            });
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FollowApi for MockFollowApi {
    async fn followers(
        &self,
        user_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<PageResponse<Follow>, ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let all = self
            .followers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user_id)
            .cloned()
            .unwrap_or_default();

        let request = PageRequest::new(page, size, Sort::descending("createdAt"));
        let contents = all
            .iter()
            .skip(request.offset() as usize)
            .take(size as usize)
            .cloned()
            .collect();

        Ok(PageResponse::new(contents, &request, all.len() as u64))
    }
}
