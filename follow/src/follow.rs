//! The follow graph itself.
//!
//! Edges are directed follower -> followed. Every successful mutation
//! publishes an event after the store commit; a publish failure is logged
//! and never rolls the mutation back, consumers converge on redelivery of
//! later events.

use std::sync::Arc;

use common::bus::{publish_event, EventBus, Topology};
use common::clients::{Follow, ProfileApi};
use common::events::{event_types, routing_keys, topics, Envelope, FollowPayload};
use common::pagination::{PageRequest, PageResponse};
use uuid::Uuid;

use crate::database::{FollowRepo, FollowRow};
use crate::error::FollowError;

/// Everything this service declares on the broker.
pub fn topology() -> Topology {
    Topology::new().exchange(topics::FOLLOW_EVENTS)
}

pub struct FollowGraph {
    repo: Arc<dyn FollowRepo>,
    profiles: Arc<dyn ProfileApi>,
    bus: Arc<dyn EventBus>,
}

impl FollowGraph {
    pub fn new(
        repo: Arc<dyn FollowRepo>,
        profiles: Arc<dyn ProfileApi>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            repo,
            profiles,
            bus,
        }
    }

    pub async fn follow(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<Follow, FollowError> {
        if follower_id == followed_id {
            return Err(FollowError::SelfFollow);
        }

        if !self.profiles.user_exists(followed_id).await? {
            return Err(FollowError::UserNotFound(followed_id));
        }

        let row = self
            .repo
            .insert(follower_id, followed_id)
            .await?
            .ok_or(FollowError::AlreadyFollowing)?;

        self.publish(event_types::FOLLOWED, routing_keys::FOLLOWED, &row)
            .await;

        Ok(row.into())
    }

    pub async fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<(), FollowError> {
        if follower_id == followed_id {
            return Err(FollowError::SelfFollow);
        }

        let row = self
            .repo
            .delete(follower_id, followed_id)
            .await?
            .ok_or(FollowError::NotFollowing)?;

        self.publish(event_types::UNFOLLOWED, routing_keys::UNFOLLOWED, &row)
            .await;

        Ok(())
    }

    pub async fn is_following(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<bool, FollowError> {
        Ok(self.repo.exists(follower_id, followed_id).await?)
    }

    pub async fn followers(
        &self,
        user_id: Uuid,
        request: PageRequest,
    ) -> Result<PageResponse<Follow>, FollowError> {
        request.sort.column(crate::database::SORTABLE_COLUMNS)?;
        let (rows, total) = self.repo.followers(user_id, &request).await?;
        Ok(to_page(rows, &request, total))
    }

    pub async fn following(
        &self,
        user_id: Uuid,
        request: PageRequest,
    ) -> Result<PageResponse<Follow>, FollowError> {
        request.sort.column(crate::database::SORTABLE_COLUMNS)?;
        let (rows, total) = self.repo.following(user_id, &request).await?;
        Ok(to_page(rows, &request, total))
    }

    async fn publish(&self, event_type: &str, routing_key: &str, row: &FollowRow) {
        let envelope = Envelope::new(
            event_type,
            FollowPayload {
                id: row.id,
                follower_id: row.follower_id,
                followed_id: row.followed_id,
                created_at: row.created_at,
            },
        );

        if let Err(err) = publish_event(
            self.bus.as_ref(),
            topics::FOLLOW_EVENTS,
            routing_key,
            &envelope,
        )
        .await
        {
            tracing::error!(
                event_type,
                follow_id = %row.id,
                "failed to publish follow event: {err:#}"
            );
        }
    }
}

fn to_page(rows: Vec<FollowRow>, request: &PageRequest, total: u64) -> PageResponse<Follow> {
    PageResponse::new(rows.into_iter().map(Follow::from).collect(), request, total)
}
