//! Synchronous collaborator lookups.
//!
//! Every cross-service read (post bodies, user existence, parent comments,
//! follower lists) goes through one of these traits. The production
//! implementations speak JSON over HTTP with a per-request timeout; tests
//! plug in the mocks from [`mock`]. Each call is an explicit fallible
//! dependency; callers decide whether a failure aborts a request or nacks a
//! bus delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pagination::PageResponse;

pub mod http;
pub mod mock;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSummary {
    pub id: Uuid,
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait TweetApi: Send + Sync {
    async fn tweet_by_id(&self, id: Uuid) -> Result<Option<Tweet>, ClientError>;

    /// Batch fetch; ids that no longer exist are simply absent from the
    /// result.
    async fn tweets_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Tweet>, ClientError>;

    /// The author's public tweets, newest first. `page` is 1-based.
    async fn public_tweets(
        &self,
        author_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<Vec<Tweet>, ClientError>;
}

#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, ClientError>;
}

#[async_trait]
pub trait CommentApi: Send + Sync {
    async fn comment_by_id(&self, id: Uuid) -> Result<Option<CommentSummary>, ClientError>;
}

#[async_trait]
pub trait FollowApi: Send + Sync {
    /// One page of the user's followers, newest first. `page` is 1-based.
    async fn followers(
        &self,
        user_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<PageResponse<Follow>, ClientError>;
}
