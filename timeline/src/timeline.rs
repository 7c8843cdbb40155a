//! Fan-out-on-write timelines.
//!
//! Writes happen when events arrive: a new tweet is copied into the
//! timeline of every follower, a new follow backfills a few recent tweets,
//! an unfollow removes that author's entries again. Reads are a single
//! indexed page over the owner's entries plus one batch tweet lookup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::bus::Topology;
use common::clients::{FollowApi, TweetApi};
use common::events::{routing_keys, topics, FollowPayload, TweetCreatedPayload};
use common::pagination::{PageRequest, PageResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::database::{NewEntry, TimelineRepo, SORTABLE_COLUMNS};
use crate::error::TimelineError;

/// How many of the followed user's recent tweets a new follower receives.
const BACKFILL_TWEETS: u32 = 3;

/// Follower page size used while fanning a tweet out.
const FANOUT_PAGE_SIZE: u32 = 1000;

pub mod queues {
    pub const FOLLOWED: &str = "timeline.followed";
    pub const UNFOLLOWED: &str = "timeline.unfollowed";
    pub const TWEET_CREATED: &str = "timeline.tweet-created";
}

pub fn topology() -> Topology {
    Topology::new()
        .exchange(topics::FOLLOW_EVENTS)
        .exchange(topics::TWEET_EVENTS)
        .queue(
            queues::FOLLOWED,
            &[(topics::FOLLOW_EVENTS, routing_keys::FOLLOWED)],
        )
        .queue(
            queues::UNFOLLOWED,
            &[(topics::FOLLOW_EVENTS, routing_keys::UNFOLLOWED)],
        )
        .queue(
            queues::TWEET_CREATED,
            &[(topics::TWEET_EVENTS, routing_keys::TWEET_CREATED)],
        )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub struct TimelineService {
    repo: Arc<dyn TimelineRepo>,
    tweets: Arc<dyn TweetApi>,
    follows: Arc<dyn FollowApi>,
}

impl TimelineService {
    pub fn new(
        repo: Arc<dyn TimelineRepo>,
        tweets: Arc<dyn TweetApi>,
        follows: Arc<dyn FollowApi>,
    ) -> Self {
        Self {
            repo,
            tweets,
            follows,
        }
    }

    /// A new follower gets the followed user's most recent tweets so their
    /// timeline is not empty until the next tweet.
    pub async fn handle_followed(&self, payload: &FollowPayload) -> anyhow::Result<()> {
        let tweets = self
            .tweets
            .public_tweets(payload.followed_id, 1, BACKFILL_TWEETS)
            .await?;

        let entries: Vec<NewEntry> = tweets
            .into_iter()
            .map(|tweet| NewEntry {
                owner_id: payload.follower_id,
                tweet_id: tweet.id,
                author_id: tweet.user_id,
                tweet_created_at: tweet.created_at,
            })
            .collect();

        let written = self.repo.insert_many(&entries).await?;
        tracing::debug!(
            follower = %payload.follower_id,
            followed = %payload.followed_id,
            written,
            "backfilled timeline after follow"
        );

        Ok(())
    }

    pub async fn handle_unfollowed(&self, payload: &FollowPayload) -> anyhow::Result<()> {
        let removed = self
            .repo
            .delete_by_owner_and_author(payload.follower_id, payload.followed_id)
            .await?;
        tracing::debug!(
            follower = %payload.follower_id,
            followed = %payload.followed_id,
            removed,
            "cleared timeline after unfollow"
        );

        Ok(())
    }

    /// Copy the tweet into every follower's timeline, walking the full
    /// follower list page by page.
    pub async fn handle_tweet_created(&self, payload: &TweetCreatedPayload) -> anyhow::Result<()> {
        let mut page = 1;
        let mut written = 0;

        loop {
            let followers = self
                .follows
                .followers(payload.user_id, page, FANOUT_PAGE_SIZE)
                .await?;

            let entries: Vec<NewEntry> = followers
                .contents
                .iter()
                .map(|follow| NewEntry {
                    owner_id: follow.follower_id,
                    tweet_id: payload.tweet_id,
                    author_id: payload.user_id,
                    tweet_created_at: payload.created_at,
                })
                .collect();
            written += self.repo.insert_many(&entries).await?;

            if page >= followers.total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!(tweet = %payload.tweet_id, written, "fanned tweet out");
        Ok(())
    }

    /// The owner's timeline page. Entries whose tweet has disappeared since
    /// fan-out are dropped from the page rather than failing it.
    pub async fn get_timeline(
        &self,
        owner_id: Uuid,
        request: PageRequest,
    ) -> Result<PageResponse<TimelineItem>, TimelineError> {
        request.sort.column(SORTABLE_COLUMNS)?;
        let (entries, total) = self.repo.page_by_owner(owner_id, &request).await?;

        let ids: Vec<Uuid> = entries.iter().map(|e| e.tweet_id).collect();
        let tweets: HashMap<Uuid, _> = self
            .tweets
            .tweets_by_ids(&ids)
            .await?
            .into_iter()
            .map(|tweet| (tweet.id, tweet))
            .collect();

        let items = entries
            .iter()
            .filter_map(|entry| {
                let tweet = tweets.get(&entry.tweet_id)?;
                Some(TimelineItem {
                    tweet_id: tweet.id,
                    user_id: tweet.user_id,
                    content: tweet.content.clone(),
                    created_at: tweet.created_at,
                })
            })
            .collect();

        Ok(PageResponse::new(items, &request, total))
    }
}
