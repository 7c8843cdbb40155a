//! Notification fan-out and the read-side store operations.
//!
//! Every consumed event resolves to zero or more recipients, is written
//! through the (event, recipient) idempotency key, and only the rows that
//! were actually new are pushed to the recipients' devices. Events that
//! reference content deleted in the meantime are logged and acked, they
//! carry no value anymore.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::bus::Topology;
use common::clients::{CommentApi, FollowApi, TweetApi};
use common::events::{
    routing_keys, topics, CommentCreatedPayload, FollowPayload, RegisterPayload, TweetCreatedPayload,
    TweetLikedPayload,
};
use common::pagination::{PageRequest, PageResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::database::{
    DeleteFilter, DeviceTokenRepo, NewNotification, NotificationKind, NotificationRepo,
    NotificationRow, SORTABLE_COLUMNS,
};
use crate::error::NotificationError;
use crate::push::PushSender;

/// Follower page size used while fanning a tweet out.
const FANOUT_PAGE_SIZE: u32 = 1000;

pub mod queues {
    pub const USER_REGISTERED: &str = "notification.user-registered";
    pub const FOLLOWED: &str = "notification.followed";
    pub const TWEET_CREATED: &str = "notification.tweet-created";
    pub const TWEET_LIKED: &str = "notification.tweet-liked";
    pub const COMMENT_CREATED: &str = "notification.comment-created";
}

pub fn topology() -> Topology {
    Topology::new()
        .exchange(topics::USER_EVENTS)
        .exchange(topics::FOLLOW_EVENTS)
        .exchange(topics::TWEET_EVENTS)
        .exchange(topics::COMMENT_EVENTS)
        .queue(
            queues::USER_REGISTERED,
            &[(topics::USER_EVENTS, routing_keys::USER_REGISTERED)],
        )
        .queue(
            queues::FOLLOWED,
            &[(topics::FOLLOW_EVENTS, routing_keys::FOLLOWED)],
        )
        .queue(
            queues::TWEET_CREATED,
            &[(topics::TWEET_EVENTS, routing_keys::TWEET_CREATED)],
        )
        .queue(
            queues::TWEET_LIKED,
            &[(topics::TWEET_EVENTS, routing_keys::TWEET_LIKED)],
        )
        .queue(
            queues::COMMENT_CREATED,
            &[(topics::COMMENT_EVENTS, routing_keys::COMMENT_CREATED)],
        )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub tweet_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationDto {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            actor_id: row.actor_id,
            kind: row.kind,
            tweet_id: row.tweet_id,
            comment_id: row.comment_id,
            message: row.message,
            read: row.is_read,
            created_at: row.created_at,
        }
    }
}

fn push_title(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Welcome => "Welcome",
        NotificationKind::Follow => "New follower",
        NotificationKind::Tweet => "New tweet",
        NotificationKind::Like => "New like",
        NotificationKind::Comment => "New comment",
    }
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepo>,
    devices: Arc<dyn DeviceTokenRepo>,
    push: Arc<dyn PushSender>,
    tweets: Arc<dyn TweetApi>,
    comments: Arc<dyn CommentApi>,
    follows: Arc<dyn FollowApi>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepo>,
        devices: Arc<dyn DeviceTokenRepo>,
        push: Arc<dyn PushSender>,
        tweets: Arc<dyn TweetApi>,
        comments: Arc<dyn CommentApi>,
        follows: Arc<dyn FollowApi>,
    ) -> Self {
        Self {
            repo,
            devices,
            push,
            tweets,
            comments,
            follows,
        }
    }

    pub async fn handle_registered(
        &self,
        event_id: &str,
        payload: &RegisterPayload,
    ) -> anyhow::Result<()> {
        let name = payload
            .display_name
            .as_deref()
            .unwrap_or(&payload.username);

        self.write_and_push(vec![NewNotification {
            recipient_id: payload.user_id,
            actor_id: None,
            kind: NotificationKind::Welcome,
            event_id: event_id.to_string(),
            tweet_id: None,
            comment_id: None,
            message: format!("Welcome, {name}! Follow people to fill your timeline."),
        }])
        .await
    }

    pub async fn handle_followed(
        &self,
        event_id: &str,
        payload: &FollowPayload,
    ) -> anyhow::Result<()> {
        // Self-follows never leave the follow service, but an upstream bug
        // must not turn into a self-notification here.
        if payload.follower_id == payload.followed_id {
            return Ok(());
        }

        self.write_and_push(vec![NewNotification {
            recipient_id: payload.followed_id,
            actor_id: Some(payload.follower_id),
            kind: NotificationKind::Follow,
            event_id: event_id.to_string(),
            tweet_id: None,
            comment_id: None,
            message: "You have a new follower.".to_string(),
        }])
        .await
    }

    /// Every follower of the author hears about the new tweet.
    pub async fn handle_tweet_created(
        &self,
        event_id: &str,
        payload: &TweetCreatedPayload,
    ) -> anyhow::Result<()> {
        let mut page = 1;

        loop {
            let followers = self
                .follows
                .followers(payload.user_id, page, FANOUT_PAGE_SIZE)
                .await?;

            let batch: Vec<NewNotification> = followers
                .contents
                .iter()
                .map(|follow| NewNotification {
                    recipient_id: follow.follower_id,
                    actor_id: Some(payload.user_id),
                    kind: NotificationKind::Tweet,
                    event_id: event_id.to_string(),
                    tweet_id: Some(payload.tweet_id),
                    comment_id: None,
                    message: "Someone you follow posted a new tweet.".to_string(),
                })
                .collect();
            self.write_and_push(batch).await?;

            if page >= followers.total_pages {
                break;
            }
            page += 1;
        }

        Ok(())
    }

    pub async fn handle_tweet_liked(
        &self,
        event_id: &str,
        payload: &TweetLikedPayload,
    ) -> anyhow::Result<()> {
        let Some(tweet) = self.tweets.tweet_by_id(payload.tweet_id).await? else {
            tracing::warn!(tweet = %payload.tweet_id, "liked tweet no longer exists, skipping");
            return Ok(());
        };

        // Liking your own tweet notifies nobody.
        if tweet.user_id == payload.user_id {
            return Ok(());
        }

        self.write_and_push(vec![NewNotification {
            recipient_id: tweet.user_id,
            actor_id: Some(payload.user_id),
            kind: NotificationKind::Like,
            event_id: event_id.to_string(),
            tweet_id: Some(payload.tweet_id),
            comment_id: None,
            message: "Someone liked your tweet.".to_string(),
        }])
        .await
    }

    /// The tweet author hears about every comment they did not write
    /// themselves. For replies the parent comment's author is notified too,
    /// unless they are the commenter or already notified as the tweet
    /// author.
    pub async fn handle_comment_created(
        &self,
        event_id: &str,
        payload: &CommentCreatedPayload,
    ) -> anyhow::Result<()> {
        let Some(tweet) = self.tweets.tweet_by_id(payload.tweet_id).await? else {
            tracing::warn!(tweet = %payload.tweet_id, "commented tweet no longer exists, skipping");
            return Ok(());
        };

        let mut batch = Vec::new();

        if tweet.user_id != payload.user_id {
            batch.push(NewNotification {
                recipient_id: tweet.user_id,
                actor_id: Some(payload.user_id),
                kind: NotificationKind::Comment,
                event_id: event_id.to_string(),
                tweet_id: Some(payload.tweet_id),
                comment_id: Some(payload.comment_id),
                message: "Someone commented on your tweet.".to_string(),
            });
        }

        if let Some(parent_id) = payload.parent_id {
            match self.comments.comment_by_id(parent_id).await? {
                Some(parent)
                    if parent.user_id != payload.user_id && parent.user_id != tweet.user_id =>
                {
                    batch.push(NewNotification {
                        recipient_id: parent.user_id,
                        actor_id: Some(payload.user_id),
                        kind: NotificationKind::Comment,
                        event_id: event_id.to_string(),
                        tweet_id: Some(payload.tweet_id),
                        comment_id: Some(payload.comment_id),
                        message: "Someone replied to your comment.".to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    tracing::warn!(parent = %parent_id, "parent comment no longer exists");
                }
            }
        }

        self.write_and_push(batch).await
    }

    /// Write the batch and push only what was actually new.
    async fn write_and_push(&self, batch: Vec<NewNotification>) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let written = self.repo.insert_many(&batch).await?;
        for row in &written {
            self.deliver(row).await;
        }

        Ok(())
    }

    async fn deliver(&self, row: &NotificationRow) {
        let tokens = match self.devices.tokens_for(row.recipient_id).await {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::error!(recipient = %row.recipient_id, "failed to load device tokens: {err:#}");
                return;
            }
        };

        for token in tokens {
            if let Err(err) = self
                .push
                .send(&token, push_title(row.kind), &row.message)
                .await
            {
                // One bad token must not starve the rest.
                tracing::warn!(recipient = %row.recipient_id, "push failed: {err:#}");
            }
        }
    }

    pub async fn list(
        &self,
        recipient_id: Uuid,
        request: PageRequest,
    ) -> Result<PageResponse<NotificationDto>, NotificationError> {
        request.sort.column(SORTABLE_COLUMNS)?;
        let (rows, total) = self.repo.page_by_recipient(recipient_id, &request).await?;
        Ok(PageResponse::new(
            rows.into_iter().map(NotificationDto::from).collect(),
            &request,
            total,
        ))
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, NotificationError> {
        Ok(self.repo.unread_count(recipient_id).await?)
    }

    pub async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> Result<(), NotificationError> {
        if !self.repo.mark_read(recipient_id, id).await? {
            return Err(NotificationError::NotFound);
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, NotificationError> {
        Ok(self.repo.mark_all_read(recipient_id).await?)
    }

    pub async fn delete(&self, recipient_id: Uuid, id: Uuid) -> Result<(), NotificationError> {
        if !self.repo.delete(recipient_id, id).await? {
            return Err(NotificationError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_many(
        &self,
        recipient_id: Uuid,
        filter: DeleteFilter,
    ) -> Result<u64, NotificationError> {
        Ok(self.repo.delete_many(recipient_id, filter).await?)
    }

    pub async fn register_device(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<(), NotificationError> {
        self.devices.register(user_id, token).await?;
        Ok(())
    }

    pub async fn unregister_device(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<(), NotificationError> {
        if !self.devices.unregister(user_id, token).await? {
            return Err(NotificationError::TokenNotFound);
        }
        Ok(())
    }
}
