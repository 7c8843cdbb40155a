//! reqwest-backed collaborator clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use super::{ClientError, CommentApi, CommentSummary, Follow, FollowApi, ProfileApi, Tweet, TweetApi};
use crate::config::CollaboratorConfig;
use crate::pagination::PageResponse;

fn build_client(config: &CollaboratorConfig) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()?)
}

pub struct HttpTweetClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTweetClient {
    pub fn new(config: &CollaboratorConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TweetApi for HttpTweetClient {
    async fn tweet_by_id(&self, id: Uuid) -> Result<Option<Tweet>, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/v1/tweets/{id}", self.base_url))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ClientError::Status(status)),
        }
    }

    async fn tweets_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Tweet>, ClientError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(format!("{}/api/v1/tweets", self.base_url))
            .query(&[("ids", ids)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }

        Ok(response.json().await?)
    }

    async fn public_tweets(
        &self,
        author_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<Vec<Tweet>, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/v1/tweets/user/{author_id}", self.base_url))
            .query(&[
                ("page", page.to_string()),
                ("size", size.to_string()),
                ("sort", "createdAt,desc".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }

        let page: PageResponse<Tweet> = response.json().await?;
        Ok(page.contents)
    }
}

pub struct HttpProfileClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProfileClient {
    pub fn new(config: &CollaboratorConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProfileApi for HttpProfileClient {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/v1/profiles/{user_id}/exists", self.base_url))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(ClientError::Status(status)),
        }
    }
}

pub struct HttpCommentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCommentClient {
    pub fn new(config: &CollaboratorConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CommentApi for HttpCommentClient {
    async fn comment_by_id(&self, id: Uuid) -> Result<Option<CommentSummary>, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/v1/comments/{id}", self.base_url))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ClientError::Status(status)),
        }
    }
}

pub struct HttpFollowClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFollowClient {
    pub fn new(config: &CollaboratorConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FollowApi for HttpFollowClient {
    async fn followers(
        &self,
        user_id: Uuid,
        page: u32,
        size: u32,
    ) -> Result<PageResponse<Follow>, ClientError> {
        let response = self
            .client
            .get(format!(
                "{}/api/v1/follows/{user_id}/followers",
                self.base_url
            ))
            .query(&[
                ("page", page.to_string()),
                ("size", size.to_string()),
                ("sort", "createdAt,desc".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }

        Ok(response.json().await?)
    }
}
