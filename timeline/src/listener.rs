//! Bus-facing side of the timeline writer.
//!
//! One handler serves all three queues; dispatch is on the envelope's
//! event-type tag. Unknown tags are acked and ignored so new producers can
//! roll out first. Undecodable payloads go straight to the dead letter
//! queue; anything else that fails is retried.

use std::sync::Arc;

use async_trait::async_trait;
use common::bus::{Delivery, EventHandler, HandlerError};
use common::events::{self, event_types, FollowPayload, TweetCreatedPayload};

use crate::timeline::TimelineService;

pub struct TimelineListener {
    service: Arc<TimelineService>,
}

impl TimelineListener {
    pub fn new(service: Arc<TimelineService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for TimelineListener {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let Some(tag) = events::event_type(&delivery.payload) else {
            return Err(HandlerError::reject(anyhow::anyhow!(
                "payload is not an event envelope"
            )));
        };

        match tag.as_str() {
            event_types::FOLLOWED => {
                let envelope = events::decode::<FollowPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_followed(&envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            event_types::UNFOLLOWED => {
                let envelope = events::decode::<FollowPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_unfollowed(&envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            event_types::TWEET_CREATED => {
                let envelope = events::decode::<TweetCreatedPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_tweet_created(&envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            other => {
                tracing::debug!(queue = %delivery.queue, event_type = other, "ignoring event");
                Ok(())
            }
        }
    }
}
